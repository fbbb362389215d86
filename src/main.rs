// Entry point and high-level CLI flow.
//
// - Option [1] loads the base and related CSV files into an in-memory store.
// - Option [2] asks for a report request, runs it, writes the envelope and
//   the grid rows to disk and prints a preview.
// - After a report, the user can go back to the selection menu or exit.
use area_report::loader::{self, LoadReport};
use area_report::output;
use area_report::types::{AreaKind, DateGranularity, ReportKind};
use area_report::util::{self, parse_date_safe};
use area_report::{run_report, AreaSelector, MemoryStore, ReportConfig, ReportRequest};
use log::warn;
use once_cell::sync::Lazy;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Mutex;

const BASE_DATASET: &str = "base";
const RELATED_DATASET: &str = "related";

// Loaded once, reused by every report in the same run.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { store: None }));

struct AppState {
    store: Option<MemoryStore>,
}

fn data_dir() -> PathBuf {
    std::env::var_os("REPORT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// One trimmed line from `input`, or `None` once input is exhausted.
fn read_trimmed_line<R: BufRead>(input: &mut R) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

/// Print `label` and read one trimmed line of input. Exits when stdin is
/// closed, so no prompt loop can spin on end of input.
fn prompt(label: &str) -> String {
    print!("{label}: ");
    let _ = io::stdout().flush();
    match read_trimmed_line(&mut io::stdin().lock()) {
        Some(line) => line,
        None => {
            println!("\nExiting the program.");
            std::process::exit(0);
        }
    }
}

fn read_choice() -> String {
    prompt("Enter choice")
}

/// Ask the user whether to go back to the report selection menu.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        match prompt("Back to Report Selection (Y/N)").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Keep asking until `parse` accepts the answer.
fn prompt_parsed<T>(label: &str, parse: impl Fn(&str) -> Option<T>) -> T {
    loop {
        if let Some(v) = parse(&prompt(label)) {
            return v;
        }
        println!("Invalid value.");
    }
}

fn print_load_report(name: &str, report: &LoadReport) {
    println!(
        "Loaded {}: {} of {} rows.",
        name,
        util::format_int(report.loaded_rows),
        util::format_int(report.total_rows)
    );
    if report.parse_errors > 0 {
        println!(
            "Note: {} rows skipped due to parse/validation errors.",
            util::format_int(report.parse_errors)
        );
    }
}

/// Handle option [1]: load `base.csv` and, when present, `related.csv`.
fn handle_load() {
    let dir = data_dir();
    let mut store = MemoryStore::new();
    match loader::load_dataset(&dir.join("base.csv")) {
        Ok((dataset, report)) => {
            print_load_report(BASE_DATASET, &report);
            store.insert(BASE_DATASET, dataset);
        }
        Err(e) => {
            eprintln!("Failed to load file: {}\n", e);
            return;
        }
    }
    let related_path = dir.join("related.csv");
    if related_path.exists() {
        match loader::load_dataset(&related_path) {
            Ok((dataset, report)) => {
                print_load_report(RELATED_DATASET, &report);
                store.insert(RELATED_DATASET, dataset);
                store.relate(BASE_DATASET, RELATED_DATASET);
            }
            Err(e) => eprintln!("Failed to load related file: {}", e),
        }
    } else {
        warn!("{} not found; issue reports are unavailable", related_path.display());
    }
    println!();
    match APP_STATE.lock() {
        Ok(mut state) => state.store = Some(store),
        Err(e) => eprintln!("Application state unavailable: {}", e),
    }
}

fn read_request() -> ReportRequest {
    let kind = prompt_parsed("Report type (INDIVIDUAL/AGGREGATED/ISSUE)", ReportKind::parse);
    let area_kind = prompt_parsed("Area (REGION/MUNICIPALITY/PARCEL)", AreaKind::parse);
    let name = prompt("Area name");
    let area = match area_kind {
        AreaKind::Region => AreaSelector::region(&name),
        AreaKind::Municipality => AreaSelector::municipality(&name),
        AreaKind::Parcel => AreaSelector::parcel(&name),
    };
    let mut request = ReportRequest::new(BASE_DATASET, kind, area);
    match kind {
        ReportKind::Issue => {
            let from = prompt_parsed("From date (YYYY-MM-DD)", |s| parse_date_safe(Some(s)));
            let to = prompt_parsed("To date (YYYY-MM-DD)", |s| parse_date_safe(Some(s)));
            request = request
                .with_range(from, to)
                .with_granularity(prompt_parsed(
                    "Date aggregation (NONE/MONTH)",
                    DateGranularity::parse,
                ));
        }
        ReportKind::Individual | ReportKind::Aggregated => {
            let names = prompt("Attribute names (comma separated)");
            request = request.with_attr_names(
                names
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty()),
            );
        }
    }
    if kind != ReportKind::Individual {
        let level = prompt("Aggregation level (REGION/MUNICIPALITY/PARCEL, empty for area)");
        if let Some(level) = AreaKind::parse(&level) {
            request = request.with_level(level);
        }
    }
    request
}

/// Handle option [2]: run one report against the loaded datasets.
///
/// Writes `report.json` and `report_rows.csv` and prints a Markdown preview.
fn handle_generate_report() {
    let state = match APP_STATE.lock() {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Application state unavailable: {}", e);
            return;
        }
    };
    let Some(store) = state.store.as_ref() else {
        println!("Error: No data loaded. Please load the CSV files first (option 1).\n");
        return;
    };

    let request = read_request();
    println!("Generating report...\n");
    let envelope = run_report(store, &request, &ReportConfig::default());

    if let Err(e) = output::write_json("report.json", &envelope) {
        eprintln!("Write error: {}", e);
    }
    if !envelope.success_flag() {
        println!("Report failed: {}\n", envelope.message());
        return;
    }
    if let Err(e) = output::write_csv("report_rows.csv", &envelope) {
        eprintln!("Write error: {}", e);
    }
    for warning in envelope.warnings() {
        println!("Warning: {}", warning);
    }
    println!("({} rows)\n", util::format_int(envelope.total()));
    output::preview_table_rows(&envelope, 5);
    println!("(Full report exported to report.json and report_rows.csv)\n");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    loop {
        println!("Select an option:");
        println!("[1] Load the files");
        println!("[2] Generate Report\n");
        match read_choice().as_str() {
            "1" => {
                handle_load();
            }
            "2" => {
                println!();
                handle_generate_report();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => {
                println!("Invalid choice. Please enter 1 or 2.\n");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn closed_input_yields_no_line() {
        let mut input = Cursor::new("  y \nN");
        assert_eq!(read_trimmed_line(&mut input).as_deref(), Some("y"));
        assert_eq!(read_trimmed_line(&mut input).as_deref(), Some("N"));
        assert_eq!(read_trimmed_line(&mut input), None);
    }
}
