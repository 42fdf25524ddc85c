//! Deterministic DOT synthesis.
//!
//! One `digraph program` with two clusters: the call graph itself and
//! an HTML-like table of the hottest functions, followed by a caption
//! with the program name and a local timestamp. For a fixed trace and
//! fixed resolver output every byte except the timestamp is identical
//! across runs: iteration follows symbol insertion order throughout.

use std::io::{self, Write};

use chrono::{DateTime, Datelike, Local, Timelike};

use crate::color::color_from_percent;
use crate::matrix::CallMatrix;
use crate::profile::Report;
use crate::symbols::SymbolTable;

/// An edge rendered above this share of total cycles is drawn bold.
const BOLD_PERCENT: f64 = 0.35;

pub struct DotOptions {
    pub program_name: String,
    /// Functions below this cumulative percent are omitted, together
    /// with any edge touching them.
    pub percent_threshold: f64,
}

pub fn write_graph<W: Write>(
    out: &mut W,
    symbols: &SymbolTable,
    matrix: &CallMatrix,
    report: &Report,
    options: &DotOptions,
) -> io::Result<()> {
    let total = report.total as f64;
    let visible: Vec<bool> = report
        .stats
        .iter()
        .map(|s| s.cumulative as f64 / total * 100.0 >= options.percent_threshold)
        .collect();

    write!(out, "digraph program {{\n\n\t")?;
    write!(
        out,
        "subgraph cluster0 {{\n\t\tratio=fill;\n\t\tnode [style=filled];\n\t\tperipheries=0;\n\n"
    )?;
    write_nodes(out, symbols, report, &visible)?;
    write_edges(out, symbols, matrix, report, &visible)?;
    write!(out, "\t}}\n\n\t")?;

    write!(
        out,
        "subgraph cluster1 {{\n\t\tperipheries=0;\n\t\tfontname=\"Helvetica,Arial,sans-serif\";\n\t\tnode [fontname=\"Helvetica,Arial,sans-serif\"]\n\t\tedge [fontname=\"Helvetica,Arial,sans-serif\"]\n\n"
    )?;
    write_hot_table(out, symbols, report)?;
    write!(out, "\t}}\n\n")?;

    write_caption(out, &options.program_name, Local::now())?;
    write!(out, "\n}}\n")
}

fn write_nodes<W: Write>(
    out: &mut W,
    symbols: &SymbolTable,
    report: &Report,
    visible: &[bool],
) -> io::Result<()> {
    let total = report.total as f64;
    for (i, symbol) in symbols.iter().enumerate() {
        if !visible[i] {
            continue;
        }
        let stats = &report.stats[i];
        let cumulative_percent = stats.cumulative as f64 / total * 100.0;
        let self_percent = stats.self_cycles as f64 / total * 100.0;
        let name = escape(&symbol.name);
        writeln!(
            out,
            "\t\t\"{name}\" [label=\"{name}\\n{cumulative_percent:.2}%\\n({self_percent:.2}%)\\n{calls} x\" fontcolor=\"white\" color=\"{color}\" {shape}",
            calls = symbol.total_calls,
            color = color_from_percent(cumulative_percent),
            shape = if stats.other > 0 {
                "shape=rectangle]"
            } else {
                "shape=ellipse]"
            },
        )?;
    }
    writeln!(out)
}

fn write_edges<W: Write>(
    out: &mut W,
    symbols: &SymbolTable,
    matrix: &CallMatrix,
    report: &Report,
    visible: &[bool],
) -> io::Result<()> {
    let total = report.total as f64;
    let count = symbols.len();
    for from in 0..count {
        for to in 0..count {
            let edge = matrix.get(from, to);
            if edge.total_calls == 0 || !visible[from] || !visible[to] {
                continue;
            }
            let percent = edge.total_cycles as f64 / total * 100.0;
            let color = color_from_percent(percent);
            let style = if percent > BOLD_PERCENT { "bold" } else { "solid" };
            let from_name = escape(&symbols.get(from).name);
            let to_name = escape(&symbols.get(to).name);
            if from != to {
                writeln!(
                    out,
                    "\t\t\"{from_name}\" -> \"{to_name}\" [label=\"  {percent:.2}%\\n {calls} x\" color=\"{color}\" style=\"{style}\" fontsize=\"10\"]",
                    calls = edge.total_calls,
                )?;
            } else {
                writeln!(
                    out,
                    "\t\t\"{from_name}\" -> \"{to_name}\" [label=\"   {calls} x\" color=\"{color}\" style=\"{style}\" fontsize=\"10\"]",
                    calls = edge.total_calls,
                )?;
            }
        }
    }
    Ok(())
}

fn write_hot_table<W: Write>(
    out: &mut W,
    symbols: &SymbolTable,
    report: &Report,
) -> io::Result<()> {
    write!(
        out,
        "\t\ta0 [shape=none label=<<TABLE border=\"0\" cellspacing=\"3\" cellpadding=\"10\" bgcolor=\"black\">\n\n\t\t"
    )?;
    for (rank, entry) in report.hot.iter().enumerate() {
        write!(out, "<TR>\n\t\t")?;
        write!(out, "<TD bgcolor=\"white\">{}</TD>\n\t\t", rank + 1)?;
        write!(
            out,
            "<TD bgcolor=\"white\">{}</TD>\n\t\t",
            html_escape(&symbols.get(entry.symbol).name)
        )?;
        write!(out, "<TD bgcolor=\"white\">{:.2}%</TD>\n\t\t", entry.percent)?;
        write!(
            out,
            "<TD bgcolor=\"white\">{} cycles</TD>\n\t\t",
            entry.self_cycles
        )?;
        write!(out, "</TR>\n\n\t\t")?;
    }
    writeln!(out, "</TABLE>>];")
}

fn write_caption<W: Write>(
    out: &mut W,
    program_name: &str,
    now: DateTime<Local>,
) -> io::Result<()> {
    write!(
        out,
        "\n\tgraph [\n\t\tfontname = \"Helvetica-Oblique\",\n\t\tfontsize = 32,\n\t\tlabel = \"\\n\\n{}\\n{}\"\n\t];",
        escape(program_name),
        caption_timestamp(now)
    )
}

/// `M/D/YYYY @ H:MM AM|PM` - 12-hour clock, minutes zero-padded.
fn caption_timestamp(now: DateTime<Local>) -> String {
    let (is_pm, hour) = now.hour12();
    format!(
        "{}/{}/{} @ {}:{:02} {}",
        now.month(),
        now.day(),
        now.year(),
        hour,
        now.minute(),
        if is_pm { "PM" } else { "AM" }
    )
}

fn escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

fn html_escape(name: &str) -> String {
    name.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_uses_a_12_hour_clock() {
        let afternoon = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap();
        assert_eq!(caption_timestamp(afternoon), "3/5/2024 @ 2:07 PM");

        let midnight = Local.with_ymd_and_hms(2024, 12, 31, 0, 30, 0).unwrap();
        assert_eq!(caption_timestamp(midnight), "12/31/2024 @ 12:30 AM");

        let noon = Local.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(caption_timestamp(noon), "1/1/2024 @ 12:00 PM");
    }

    #[test]
    fn names_are_escaped_for_dot_and_html() {
        assert_eq!(escape(r#"operator"new""#), r#"operator\"new\""#);
        assert_eq!(html_escape("vec<int>&"), "vec&lt;int&gt;&amp;");
    }
}
