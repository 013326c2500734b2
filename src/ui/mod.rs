//! Terminal output for the interactive workflow.
//!
//! Everything here takes an explicit [`Theme`]; nothing consults global
//! color state.

use comfy_table::{Attribute, Cell, Table};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::io::{BufRead, IsTerminal, Write};
use std::time::Duration;

use crate::models::{PollState, PollStatus, SearchRecord};

const RULE_WIDTH: usize = 60;
const TITLE_WIDTH: usize = 60;

/// Whether terminal output is colored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub color: bool,
}

impl Theme {
    /// Color when stdout is a terminal and `NO_COLOR` is unset
    pub fn detect() -> Self {
        Self {
            color: std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    fn cyan(&self, text: &str) -> String {
        if self.color {
            text.cyan().to_string()
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        if self.color {
            text.green().to_string()
        } else {
            text.to_string()
        }
    }

    fn yellow(&self, text: &str) -> String {
        if self.color {
            text.yellow().to_string()
        } else {
            text.to_string()
        }
    }

    fn red(&self, text: &str) -> String {
        if self.color {
            text.red().to_string()
        } else {
            text.to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// `[i/n] message`
    pub fn step(&self, index: usize, total: usize, msg: &str) {
        println!("  {} {}", self.cyan(&format!("[{}/{}]", index, total)), msg);
    }

    pub fn ok(&self, msg: &str) {
        println!("  {}", self.green(&format!("  ✓ {}", msg)));
    }

    pub fn warn(&self, msg: &str) {
        println!("  {}", self.yellow(&format!("  ⚠ {}", msg)));
    }

    pub fn err(&self, msg: &str) {
        eprintln!("  {}", self.red(&format!("  ✗ {}", msg)));
    }

    pub fn info(&self, msg: &str) {
        println!("  {}", self.dim(&format!("    {}", msg)));
    }

    /// Boxed header with a title and labelled lines
    pub fn banner(&self, title: &str, lines: &[(&str, String)]) {
        let rule = "═".repeat(RULE_WIDTH);
        println!();
        println!("{}", self.bold(&rule));
        println!("{}", self.bold(&format!("  {}", title)));
        println!("{}", self.bold(&rule));
        for (label, value) in lines {
            println!("  {:<8}{}", format!("{}:", label), value);
        }
        println!("{}", rule);
        println!();
    }

    /// Closing box printed after a successful run
    pub fn success_box(&self, title: &str, lines: &[(&str, String)]) {
        let rule = self.green(&"═".repeat(RULE_WIDTH));
        println!();
        println!("{}", rule);
        println!("{}", self.green(&self.bold(&format!("  ✓ {}", title))));
        for (label, value) in lines {
            println!("{}", self.green(&format!("  {}: {}", label, value)));
        }
        println!("{}", rule);
        println!();
    }
}

/// Shorten `text` to at most `max_chars` characters, marking the cut with `...`
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return "...".to_string();
    }
    let kept: String = text.chars().take(max_chars - 3).collect();
    format!("{}...", kept)
}

/// Build the table of discovered sources
pub fn sources_table(theme: &Theme, records: &[SearchRecord]) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    if !theme.color {
        table.force_no_tty();
    }
    table.set_header(vec!["#", "Title", "Source", "Year", "Citations", "URL"]);

    for (i, record) in records.iter().enumerate() {
        let citations = match record.citation_count() {
            0 => String::new(),
            n => n.to_string(),
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(truncate_with_ellipsis(record.title(), TITLE_WIDTH)).add_attribute(Attribute::Bold),
            Cell::new(record.origin_provider().name()),
            Cell::new(record.year().unwrap_or_default()),
            Cell::new(citations),
            Cell::new(record.import_url().unwrap_or_default()),
        ]);
    }
    table
}

/// Print the discovered sources, or a warning when there are none
pub fn print_sources_table(theme: &Theme, records: &[SearchRecord], label: &str) {
    if records.is_empty() {
        theme.warn(&format!("No {} found", label.to_lowercase()));
        return;
    }
    println!();
    println!("  {}", theme.bold(&format!("{} ({}):", label, records.len())));
    println!("{}", sources_table(theme, records));
    println!();
}

/// Whether a typed answer means yes; an empty answer accepts the default
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes")
}

/// Ask a yes/no question on stdin. With `auto` the question is answered yes
/// without reading input; a closed stdin counts as no.
pub fn confirm(theme: &Theme, msg: &str, auto: bool) -> bool {
    if auto {
        println!("  {}", theme.green(&format!("  → Auto-confirmed: {}", msg)));
        return true;
    }
    print!("  {}", theme.yellow(&format!("  ? {} [Y/n]: ", msg)));
    let _ = std::io::stdout().flush();

    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(0) | Err(_) => {
            println!();
            false
        }
        Ok(_) => is_affirmative(&answer),
    }
}

/// Block until the operator presses Enter (or stdin closes)
pub fn wait_for_enter(theme: &Theme, msg: &str) {
    print!("  {}", theme.yellow(&format!("  ↵ {}", msg)));
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line).is_err() {
        println!();
    }
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Sleep `seconds`, drawing a countdown bar while waiting
pub async fn countdown(theme: &Theme, seconds: u64, msg: &str) {
    let pb = if theme.color {
        ProgressBar::new(seconds)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(bar_style("    {msg} {bar:40.cyan/blue} {pos}/{len}s").progress_chars("█▓▒░ "));
    pb.set_message(msg.to_string());

    for _ in 0..seconds {
        tokio::time::sleep(Duration::from_secs(1)).await;
        pb.inc(1);
    }
    pb.finish_and_clear();
}

/// One-line summary of a tracking session
pub fn progress_message(state: &PollState) -> String {
    let mut msg = format!(
        "poll #{}: status={}",
        state.attempt_count(),
        state.last_reported_status().unwrap_or("unknown")
    );
    if state.rapid_mode() {
        msg.push_str(" [rapid]");
    }
    if let Some(kind) = state.last_error_kind() {
        msg.push_str(&format!(" (last issue: {:?})", kind));
    }
    msg
}

/// Spinner redrawn from the tracker's observer callbacks
pub struct TrackerProgress {
    pb: ProgressBar,
}

impl TrackerProgress {
    pub fn new(theme: &Theme) -> Self {
        let pb = if theme.color {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::with_template("    {spinner:.cyan} {elapsed_precise} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Self { pb }
    }

    pub fn observe(&self, state: &PollState) {
        if state.status() == PollStatus::Pending {
            self.pb.set_message(progress_message(state));
        } else {
            self.pb.finish_and_clear();
        }
    }
}

impl Drop for TrackerProgress {
    fn drop(&mut self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }
}
