use lopdf::Document;
use packslip::extractor::extract_pages;
use packslip::ClassifierConfig;
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: debug_pages <pdf_path> [max_page | min-max]");
        std::process::exit(1);
    }

    let range = args.get(2).map(|s| s.as_str()).unwrap_or("1-3");
    let (min_page, max_page) = if let Some((a, b)) = range.split_once('-') {
        (a.parse().unwrap_or(1), b.parse().unwrap_or(3))
    } else {
        (1, range.parse().unwrap_or(3))
    };

    let doc = match Document::load(&args[1]) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let classifier = ClassifierConfig::default();

    for (page, lines) in extract_pages(&doc) {
        if page < min_page || page > max_page {
            continue;
        }
        match lines {
            Ok(lines) => {
                let text = lines.iter().map(|l| l.text()).collect::<Vec<_>>().join("\n");
                println!(
                    "=== PAGE {} ({} lines, packing slip: {}) ===",
                    page,
                    lines.len(),
                    classifier.classify(Some(&text))
                );
                for line in &lines {
                    println!("  y={:7.1} {:?}", line.y, line.text());
                }
            }
            Err(e) => println!("=== PAGE {} (unreadable: {}) ===", page, e),
        }
        println!();
    }
}
