// emunwa - Console output
// Printing of replies and of session events

use std::collections::BTreeMap;
use std::sync::Mutex;

use colored::Colorize;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use emunwa_gui_core::{AppCore, EmuEventHandler, GuiEvent};

/// Prints session events; with `show_view` also prints changed lists and readout
#[derive(Default)]
pub struct ConsoleHandler {
    show_view: bool,
    last: Mutex<Snapshot>,
}

#[derive(Default, PartialEq)]
struct Snapshot {
    emulator_label: String,
    core_labels: Vec<String>,
    memories: (Vec<String>, Vec<String>),
    readout: String,
}

impl ConsoleHandler {
    pub fn new(show_view: bool) -> Self {
        Self {
            show_view,
            last: Mutex::new(Snapshot::default()),
        }
    }
}

impl EmuEventHandler for ConsoleHandler {
    fn on_status_message(&self, message: &str) {
        println!("{} {}", "»".cyan(), message.cyan());
    }

    fn on_error(&self, error: &str) {
        eprintln!("{}", format!("✗ {}", error).red());
    }

    fn on_success(&self, message: &str) {
        println!("{}", format!("✓ {}", message).green().bold());
    }

    fn on_view_changed(&self, core: &AppCore) {
        if !self.show_view {
            return;
        }
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());

        if core.emulator_label != last.emulator_label {
            if !core.emulator_label.is_empty() {
                println!("{} {}", "Emulator:".bold(), core.emulator_label);
            }
            last.emulator_label = core.emulator_label.clone();
        }

        let core_labels: Vec<String> = core.cores.iter().map(|c| c.label()).collect();
        if core_labels != last.core_labels {
            for (i, label) in core_labels.iter().enumerate() {
                println!("  {:>2}. {}", i + 1, label.green());
            }
            last.core_labels = core_labels;
        }

        let memories = (core.read_memories.clone(), core.write_memories.clone());
        if memories != last.memories {
            if !memories.0.is_empty() || !memories.1.is_empty() {
                println!(
                    "{} read: {}  write: {}",
                    "Memories".bold(),
                    memories.0.join(", "),
                    memories.1.join(", ")
                );
            }
            last.memories = memories;
        }

        if core.readout != last.readout {
            if !core.readout.is_empty() {
                println!("{}", core.readout);
            }
            last.readout = core.readout.clone();
        }
    }
}

/// Print one-shot event output the same way the session handler does
pub fn print_event(event: &GuiEvent) {
    match event {
        GuiEvent::StatusMessage(message) => {
            println!("{}", message);
        }
        GuiEvent::ShowError(error) => eprintln!("{}", format!("✗ {}", error).red()),
        GuiEvent::ShowSuccess(message) => println!("{}", format!("✓ {}", message).green().bold()),
    }
}

/// Print `key:value` lines as an aligned list
pub fn print_pairs(lines: &[String]) {
    let pairs: Vec<(&str, &str)> = lines
        .iter()
        .map(|l| l.split_once(':').unwrap_or((l.as_str(), "")))
        .collect();
    let width = pairs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in pairs {
        let key = format!("{:width$}", format!("{}:", key), width = width + 1);
        println!("  {}  {}", key.bold(), value);
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).add_attribute(Attribute::Bold).fg(Color::Cyan))
        .collect()
}

pub fn print_cores_table(cores: &[BTreeMap<String, String>]) {
    if cores.is_empty() {
        println!("{}", "No cores found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header(&["Name", "Platform"]));
    for core in cores {
        table.add_row(vec![
            Cell::new(core.get("name").map(String::as_str).unwrap_or("-")).fg(Color::Green),
            Cell::new(core.get("platform").map(String::as_str).unwrap_or("-")),
        ]);
    }

    println!("{}", table);
    println!("{} core(s) found", cores.len().to_string().cyan());
}

pub fn print_memories_table(memories: &[BTreeMap<String, String>]) {
    if memories.is_empty() {
        println!("{}", "No memories exposed (is a core loaded?)".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header(&["Name", "Access", "Size"]));
    for memory in memories {
        let size = memory
            .get("size")
            .and_then(|s| s.parse::<u64>().ok())
            .map(|s| format!("{} (0x{:x})", s, s))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(memory.get("name").map(String::as_str).unwrap_or("-")).fg(Color::Green),
            Cell::new(memory.get("access").map(String::as_str).unwrap_or("rw")),
            Cell::new(size).fg(Color::DarkGrey),
        ]);
    }

    println!("{}", table);
}
