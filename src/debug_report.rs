use modlore::{ProcessResult, scan_text};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_run(input: &str, result: &ProcessResult, color: bool) {
    let palette = ansi::Palette::new(color);
    let preview: String = input.chars().take(60).collect();
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Scanning: \"{}\"", preview), ansi::CYAN)));

    // Raw spans, before any configuration is applied
    println!("\n{}", palette.paint("━━━ Scan ━━━", ansi::GRAY));
    print_spans(input, &palette);

    println!("\n{}", palette.paint("━━━ Candidates ━━━", ansi::GRAY));
    print_candidates(result, &palette);

    println!("\n{}", palette.paint("━━━ Output ━━━", ansi::GRAY));
    if result.outcome.content.is_empty() {
        println!("{}", palette.dim("  No modules emitted"));
        println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
        println!("  • No well-formed [Name|...] spans in the input");
        println!("  • Module names were filtered out by the configuration");
        println!("  • Hide conditions suppressed every record");
        println!("\n{}", palette.dim("  Tip: Set MODLORE_DEBUG=1 to see per-stage decision traces"));
    } else {
        for line in result.outcome.content.lines() {
            println!("  {}", palette.bold(palette.paint(line, ansi::GREEN)));
        }
        println!(
            "  {} {}  {} {}",
            palette.dim("title:"),
            palette.paint(&result.outcome.display_title, ansi::BLUE),
            palette.dim("│ records:"),
            palette.paint(result.outcome.module_count.to_string(), ansi::YELLOW)
        );
    }

    // Timing
    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    let stages = result
        .details
        .stages
        .iter()
        .map(|s| format!("{}: {}", s.stage, palette.paint(format!("{:?}", s.duration), ansi::CYAN)))
        .collect::<Vec<_>>()
        .join("  │  ");
    println!(
        "  Total: {}  │  {}",
        palette.paint(format!("{:?}", result.details.total), ansi::GREEN),
        stages
    );
    println!();
}

fn print_spans(input: &str, palette: &ansi::Palette) {
    let spans = scan_text(input);
    if spans.is_empty() {
        println!("{}", palette.dim("  No module spans found"));
        return;
    }
    for span in &spans {
        let nested = if span.nested_variables.is_empty() {
            String::new()
        } else {
            format!("  nested: {}", span.nested_variables.join(", "))
        };
        println!(
            "  {} {} {}{}",
            palette.paint(format!("{}..{}", span.start, span.end), ansi::YELLOW),
            palette.paint(&span.module_name, ansi::BLUE),
            palette.dim(format!("level {}", span.level)),
            palette.dim(nested)
        );
    }
}

fn print_candidates(result: &ProcessResult, palette: &ansi::Palette) {
    if result.details.candidates.is_empty() {
        println!("{}", palette.dim("  No candidates extracted"));
        return;
    }
    for (idx, cand) in result.details.candidates.iter().enumerate() {
        println!(
            "  {} {} {} {}",
            palette.paint(format!("[{}]", idx), ansi::GRAY),
            palette.bold(palette.paint(&cand.module_name, ansi::GREEN)),
            palette.dim("│"),
            palette.paint(format!("msg {} ({})", cand.message_index, cand.speaker), ansi::YELLOW),
        );
        println!("      {}", palette.dim(&cand.preview));
    }
}
