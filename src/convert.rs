//! Spreadsheet to PDF conversion through LibreOffice

use crate::PackError;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Converts an office document into a PDF placed in an output directory
pub trait DocumentConverter {
    /// Convert `input`, returning the path of the produced PDF
    fn convert_to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, PackError>;
}

/// Headless LibreOffice (`soffice --headless --convert-to pdf`)
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    /// Executable name or path
    pub program: PathBuf,
    /// Time allowed for one conversion before the process is killed
    pub timeout: Duration,
}

impl Default for SofficeConverter {
    fn default() -> Self {
        Self {
            program: PathBuf::from("soffice"),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Path LibreOffice writes the PDF of `input` to: same stem, `.pdf`, in `out_dir`
pub fn converted_pdf_path(input: &Path, out_dir: &Path) -> PathBuf {
    let mut name = input.file_stem().unwrap_or_default().to_os_string();
    name.push(".pdf");
    out_dir.join(name)
}

impl DocumentConverter for SofficeConverter {
    fn convert_to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, PackError> {
        let conversion_error = |reason: String| PackError::Conversion {
            path: input.display().to_string(),
            reason,
        };

        let mut child = Command::new(&self.program)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    PackError::ConverterUnavailable(self.program.display().to_string())
                }
                _ => conversion_error(format!("failed to start: {}", e)),
            })?;

        // Drain stderr while polling; a full pipe blocks the child
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PackError::ConversionTimeout {
                    path: input.display().to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default();
        if !stderr.trim().is_empty() {
            log::debug!("{} stderr: {}", self.program.display(), stderr.trim());
        }

        if !status.success() {
            return Err(conversion_error(format!(
                "non-zero exit status {}: {}",
                status,
                stderr.trim()
            )));
        }

        let output = converted_pdf_path(input, out_dir);
        if !output.exists() {
            return Err(conversion_error(format!(
                "expected output {} was not produced",
                output.display()
            )));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converted_pdf_path() {
        let path = converted_pdf_path(Path::new("/data/PL 4711.xlsx"), Path::new("/tmp/out"));
        assert_eq!(path, PathBuf::from("/tmp/out/PL 4711.pdf"));
    }

    #[test]
    fn test_converted_pdf_path_with_dots_in_name() {
        let path = converted_pdf_path(Path::new("PL.v2.final.xls"), Path::new("out"));
        assert_eq!(path, PathBuf::from("out/PL.v2.final.pdf"));
    }

    #[cfg(unix)]
    fn fake_soffice(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let program = dir.join("fake-soffice");
        std::fs::write(&program, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
        program
    }

    #[cfg(unix)]
    #[test]
    fn test_large_stderr_does_not_stall_conversion() {
        let dir = tempfile::tempdir().unwrap();
        // Arguments: --headless --convert-to pdf --outdir <dir> <file>
        let program = fake_soffice(
            dir.path(),
            "head -c 262144 /dev/zero | tr '\\0' x >&2\ntouch \"$5/PL.pdf\"",
        );
        let converter = SofficeConverter {
            program,
            timeout: Duration::from_secs(20),
        };

        let output = converter
            .convert_to_pdf(Path::new("PL.xlsx"), dir.path())
            .unwrap();
        assert_eq!(output, dir.path().join("PL.pdf"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_conversion_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_soffice(
            dir.path(),
            "head -c 262144 /dev/zero | tr '\\0' x >&2\necho 'source file could not be loaded' >&2\nexit 3",
        );
        let converter = SofficeConverter {
            program,
            timeout: Duration::from_secs(20),
        };

        match converter.convert_to_pdf(Path::new("PL.xlsx"), dir.path()) {
            Err(PackError::Conversion { reason, .. }) => {
                assert!(reason.contains("source file could not be loaded"));
            }
            other => panic!("expected a conversion error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_converter_is_unavailable() {
        let converter = SofficeConverter {
            program: PathBuf::from("/nonexistent/packslip-soffice"),
            timeout: Duration::from_secs(1),
        };
        let dir = tempfile::tempdir().unwrap();
        let err = converter
            .convert_to_pdf(Path::new("PL.xlsx"), dir.path())
            .unwrap_err();
        assert!(err.is_batch_fatal());
    }
}
