//! Full-pipeline scenarios: trace bytes in, DOT text out.

use cycletrace::decode::{DecodeError, EventReader};
use cycletrace::dot::{write_graph, DotOptions};
use cycletrace::profile::{Profile, Report};
use cycletrace_wire::{encode_record, EventKind, MAX_RECORD_LEN};

const FUNC_A: u32 = 0x8C01_0000;
const FUNC_B: u32 = 0x8C01_053C;

fn encode(events: &[(EventKind, u32, u64)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut last = 0u64;
    for &(kind, address, cycles) in events {
        let mut buf = [0u8; MAX_RECORD_LEN];
        let len = encode_record(kind, address, cycles - last, &mut buf);
        bytes.extend_from_slice(&buf[..len]);
        last = cycles;
    }
    bytes
}

fn test_resolver() -> Box<dyn cycletrace::resolver::NameResolver> {
    Box::new(|address: u32| {
        Some(
            match address {
                FUNC_A => "funcA",
                FUNC_B => "funcB",
                _ => "unknown",
            }
            .to_string(),
        )
    })
}

/// Decode `bytes` to completion, returning the profile and any
/// framing error met on the way.
fn analyze(bytes: &[u8]) -> (Profile, Report, Option<DecodeError>) {
    let mut profile = Profile::new(test_resolver());
    let mut reader = EventReader::new(bytes);
    let mut framing = None;
    loop {
        match reader.next_event() {
            Ok(Some(event)) => profile.observe(event).unwrap(),
            Ok(None) => break,
            Err(err) => {
                framing = Some(err);
                break;
            }
        }
    }
    profile.finish();
    let report = profile.reduce();
    (profile, report, framing)
}

fn render(profile: &Profile, report: &Report, threshold: f64) -> String {
    let mut out = Vec::new();
    write_graph(
        &mut out,
        profile.symbols(),
        profile.matrix(),
        report,
        &DotOptions {
            program_name: "program.elf".to_string(),
            percent_threshold: threshold,
        },
    )
    .unwrap();
    String::from_utf8(out).unwrap()
}

/// Everything but the timestamp caption must be stable across runs.
fn strip_caption(dot: &str) -> String {
    dot.lines()
        .filter(|line| !line.starts_with("\t\tlabel = "))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn a_calls_b_renders_expected_nodes_edges_and_table() {
    let bytes = encode(&[
        (EventKind::Entry, FUNC_A, 100),
        (EventKind::Entry, FUNC_B, 110),
        (EventKind::Exit, FUNC_B, 140),
        (EventKind::Exit, FUNC_A, 150),
    ]);
    let (profile, report, framing) = analyze(&bytes);
    assert!(framing.is_none());

    let dot = render(&profile, &report, 0.0);
    assert!(dot.starts_with("digraph program {"));
    assert!(dot.ends_with("\n}\n"));

    // A keeps 20 of its 50 cycles; B burns its full 30.
    assert!(dot.contains("\"funcA\" [label=\"funcA\\n100.00%\\n(40.00%)\\n1 x\""));
    assert!(dot.contains("shape=rectangle]"));
    assert!(dot.contains("\"funcB\" [label=\"funcB\\n60.00%\\n(60.00%)\\n1 x\""));
    assert!(dot.contains("shape=ellipse]"));
    assert!(dot.contains("\"funcA\" -> \"funcB\" [label=\"  60.00%\\n 1 x\""));

    // Hot table is ordered by self share: B (60%) above A (40%).
    let b_row = dot.find("<TD bgcolor=\"white\">funcB</TD>").unwrap();
    let a_row = dot.find("<TD bgcolor=\"white\">funcA</TD>").unwrap();
    assert!(b_row < a_row);
    assert!(dot.contains("<TD bgcolor=\"white\">30 cycles</TD>"));
}

#[test]
fn direct_recursion_renders_a_self_edge_with_cumulative_cycles() {
    let bytes = encode(&[
        (EventKind::Entry, FUNC_A, 0),
        (EventKind::Entry, FUNC_A, 5),
        (EventKind::Exit, FUNC_A, 15),
        (EventKind::Exit, FUNC_A, 20),
    ]);
    let (profile, report, framing) = analyze(&bytes);
    assert!(framing.is_none());

    let a = profile.symbols().lookup(FUNC_A).unwrap();
    assert_eq!(report.stats[a].cumulative, 20);
    assert_eq!(report.stats[a].self_cycles, 20);
    assert_eq!(profile.matrix().get(a, a).total_cycles, 20);

    let dot = render(&profile, &report, 0.0);
    // Self-edges carry the call count only.
    assert!(dot.contains("\"funcA\" -> \"funcA\" [label=\"   1 x\""));
}

#[test]
fn empty_trace_renders_a_caption_only_graph() {
    let (profile, report, framing) = analyze(&[]);
    assert!(framing.is_none());
    assert_eq!(profile.symbols().len(), 0);

    let dot = render(&profile, &report, 0.0);
    assert!(dot.starts_with("digraph program {"));
    assert!(!dot.contains("->"));
    assert!(!dot.contains("shape="));
    assert!(!dot.contains("<TR>"));
    assert!(dot.contains("label = \"\\n\\nprogram.elf\\n"));
}

#[test]
fn truncated_tail_keeps_the_decoded_prefix() {
    let mut bytes = encode(&[
        (EventKind::Entry, FUNC_A, 100),
        (EventKind::Exit, FUNC_A, 150),
    ]);
    // A dangling 4-byte fragment of a further record.
    bytes.extend_from_slice(&[b'>', 0x00, 0x10, 0x01]);

    let (profile, report, framing) = analyze(&bytes);
    assert!(matches!(framing, Some(DecodeError::Truncated { .. })));

    let a = profile.symbols().lookup(FUNC_A).unwrap();
    assert_eq!(report.stats[a].cumulative, 50);

    let dot = render(&profile, &report, 0.0);
    assert!(dot.contains("\"funcA\""));
}

#[test]
fn threshold_omits_cold_functions_and_their_edges() {
    let bytes = encode(&[
        (EventKind::Entry, FUNC_A, 100),
        (EventKind::Entry, FUNC_B, 110),
        (EventKind::Exit, FUNC_B, 140),
        (EventKind::Exit, FUNC_A, 150),
    ]);
    let (profile, report, _) = analyze(&bytes);

    // funcB sits at 60% cumulative; an 80% floor leaves only funcA.
    let dot = render(&profile, &report, 80.0);
    assert!(dot.contains("\"funcA\" [label="));
    assert!(!dot.contains("\"funcB\" [label="));
    assert!(!dot.contains("->"));

    // The hot table ignores the floor.
    assert!(dot.contains("<TD bgcolor=\"white\">funcB</TD>"));
}

#[test]
fn output_is_deterministic_modulo_the_caption() {
    let bytes = encode(&[
        (EventKind::Entry, FUNC_A, 100),
        (EventKind::Entry, FUNC_B, 110),
        (EventKind::Exit, FUNC_B, 140),
        (EventKind::Exit, FUNC_A, 150),
    ]);

    let (profile_one, report_one, _) = analyze(&bytes);
    let (profile_two, report_two, _) = analyze(&bytes);
    let first = strip_caption(&render(&profile_one, &report_one, 0.0));
    let second = strip_caption(&render(&profile_two, &report_two, 0.0));
    assert_eq!(first, second);
}
