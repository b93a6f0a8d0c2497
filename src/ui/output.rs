use crate::error::{UserFriendlyError, ZipMergeError};
use crate::extractor::{ContainerSummary, EstimatedDuration, ExtractionRecord, ExtractionStatus};
use crate::RunReport;
use console::{style, Emoji, Term};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

impl OutputMode {
    pub fn from_string(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputMode::Json,
            "plain" => OutputMode::Plain,
            _ => OutputMode::Human,
        }
    }
}

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static SKIP: Emoji = Emoji("⏭️  ", "- ");
static LOOKING_GLASS: Emoji = Emoji("🔍 ", "? ");
static REPEAT: Emoji = Emoji("🔁 ", "~ ");
static PACKAGE: Emoji = Emoji("📦 ", "> ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Whether a progress bar may draw on the terminal.
    pub fn shows_progress(&self) -> bool {
        self.mode == OutputMode::Human && !self.quiet
    }

    // Core messaging methods
    pub fn success(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Success, message),
                OutputMode::Json => self.print_json_message("success", message),
                OutputMode::Plain => println!("SUCCESS: {}", message),
            }
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_show_message(2) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("  {}", style(message).dim());
                    } else {
                        println!("  DEBUG: {}", message);
                    }
                }
                OutputMode::Json => self.print_json_message("debug", message),
                OutputMode::Plain => println!("DEBUG: {}", message),
            }
        }
    }

    // User-friendly error handling
    pub fn print_user_friendly_error(&self, error: &ZipMergeError) {
        let user_message = error.user_message();
        self.error(&user_message);

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(&format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => {
                    eprintln!("SUGGESTION: {}", suggestion);
                }
            }
        }
    }

    pub fn print_container_summary(&self, summary: &ContainerSummary) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{}{}", PACKAGE, style(summary.path.display()).bold());
                } else {
                    println!("ZIP: {}", summary.path.display());
                }
                for line in summary_lines(summary) {
                    println!("  {}", line);
                }
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "container_summary",
                    "summary": summary,
                    "files_to_extract": summary.files_to_extract(),
                }));
            }
            OutputMode::Plain => {
                println!("ZIP: {}", summary.path.display());
                for line in summary_lines(summary) {
                    println!("{}", line);
                }
            }
        }
    }

    pub fn print_extraction_plan(&self, confirmed: &[ContainerSummary]) {
        if self.quiet {
            return;
        }

        let total_files: usize = confirmed.iter().map(|s| s.files_to_extract()).sum();
        let total_seconds: u64 = confirmed.iter().map(|s| s.estimated_time.total_seconds()).sum();
        let estimated = EstimatedDuration::from_seconds(total_seconds);

        match self.mode {
            OutputMode::Human | OutputMode::Plain => {
                println!();
                if self.use_colors {
                    println!("{}", style("Final Extraction Summary").bold().cyan());
                } else {
                    println!("Final Extraction Summary:");
                }
                println!("  Confirmed ZIPs:         {}", confirmed.len());
                println!("  Total Files to Extract: {}", total_files);
                println!("  Total Estimated Time:   {}", estimated);
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "extraction_plan",
                    "containers": confirmed.len(),
                    "files_to_extract": total_files,
                    "estimated_time": estimated,
                }));
            }
        }
    }

    /// Prints one container's slice of the extraction log.
    pub fn print_extraction_log(&self, container: &Path, records: &[ExtractionRecord], dry_run: bool) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human | OutputMode::Plain => {
                println!();
                if dry_run {
                    println!("{}DRY RUN - Extraction Log for {}:", LOOKING_GLASS, container.display());
                } else {
                    println!("Extraction Log for {}:", container.display());
                }
                self.print_separator();
                for record in records {
                    if let Some(line) = self.record_line(record) {
                        println!("{}", line);
                    }
                }
                self.print_separator();
            }
            OutputMode::Json => {
                for record in records {
                    self.print_json_object(&serde_json::json!({
                        "type": "record",
                        "container": container,
                        "record": record,
                    }));
                }
            }
        }
    }

    pub fn print_run_summary(&self, report: &RunReport) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human | OutputMode::Plain => {
                println!();
                if report.dry_run {
                    println!("{}DRY RUN completed - no files were modified.", LOOKING_GLASS);
                } else if report.has_failures() {
                    self.print_human_message(
                        MessageType::Warning,
                        "Some ZIP files or entries failed. See the log above.",
                    );
                } else if report.containers_processed > 0 {
                    self.print_human_message(
                        MessageType::Success,
                        "All confirmed ZIP files processed successfully.",
                    );
                }

                if self.verbose_level >= 1 || self.mode == OutputMode::Plain {
                    println!("  Containers processed: {}", report.containers_processed);
                    println!("  Containers skipped:   {}", report.containers_skipped);
                    println!("  Containers failed:    {}", report.containers_failed);
                    println!("  Extracted:            {}", report.extracted);
                    println!("  Skipped:              {}", report.skipped);
                    println!("  Failed:               {}", report.failed);
                }
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "run_summary",
                    "report": report,
                    "timestamp": chrono::Utc::now().to_rfc3339()
                }));
            }
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => {
                println!("{}", "-".repeat(60));
            }
            OutputMode::Json => {} // No separator in JSON mode
        }
    }

    fn record_line(&self, record: &ExtractionRecord) -> Option<String> {
        let prefix = if record.dry_run { "[DRY RUN] " } else { "" };
        let size_mb = record.size as f64 / (1024.0 * 1024.0);

        if self.mode == OutputMode::Plain {
            return Some(format!(
                "{}{} {} -> {}: {}",
                prefix,
                record.status.as_str().to_uppercase(),
                record.source_path,
                record.dest_path.display(),
                record.reason
            ));
        }

        let line = match record.status {
            ExtractionStatus::Extracted => format!(
                "{}{}{} -> {} ({:.2} MB)",
                prefix,
                CHECKMARK,
                record.source_path,
                record.dest_path.display(),
                size_mb
            ),
            ExtractionStatus::WouldExtract => format!(
                "{}{}{} -> {} ({:.2} MB)",
                prefix,
                LOOKING_GLASS,
                record.source_path,
                record.dest_path.display(),
                size_mb
            ),
            ExtractionStatus::Skipped => {
                format!("{}{}{}: {}", prefix, SKIP, record.source_path, record.reason)
            }
            ExtractionStatus::Failed => {
                let line = format!("{}{}{}: {}", prefix, CROSS, record.source_path, record.reason);
                if self.use_colors {
                    style(line).red().to_string()
                } else {
                    line
                }
            }
            ExtractionStatus::Replacing | ExtractionStatus::Retry => {
                if self.verbose_level == 0 {
                    return None;
                }
                format!(
                    "{}{}{} {}: {}",
                    prefix, REPEAT, record.status, record.source_path, record.reason
                )
            }
        };

        Some(line)
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        #[allow(clippy::type_complexity)]
        let (emoji, color_fn): (Emoji, Box<dyn Fn(&str) -> console::StyledObject<&str>>) =
            match msg_type {
                MessageType::Success => (CHECKMARK, Box::new(|msg| style(msg).green().bold())),
                MessageType::Error => (CROSS, Box::new(|msg| style(msg).red().bold())),
                MessageType::Warning => (WARNING, Box::new(|msg| style(msg).yellow().bold())),
                MessageType::Info => (INFO, Box::new(|msg| style(msg).cyan())),
            };

        if self.use_colors {
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, color_fn(message)),
                _ => println!("{}{}", emoji, color_fn(message)),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

fn summary_lines(summary: &ContainerSummary) -> [String; 4] {
    [
        format!("Total Files: {}", summary.total_files),
        format!("Already Extracted: {}", summary.already_extracted),
        format!("Files to Extract: {}", summary.files_to_extract()),
        format!("Estimated Time: {}", summary.estimated_time),
    ]
}
