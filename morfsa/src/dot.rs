//! Graphviz export, for looking at small automata.
use std::io::{self, Write};

use crate::fsa::Fsa;
use crate::traversal::visit_pre_order;
use crate::types::NodeIndex;

/// Write `fsa` as a Graphviz digraph.
///
/// Terminal arcs point to a shared `stop` node and final arcs are drawn
/// bold. Nodes are labeled with their right-language count if the
/// automaton stores one.
pub fn write_dot<F: Fsa + ?Sized, W: Write>(fsa: &F, out: &mut W) -> io::Result<()> {
    writeln!(out, "digraph Automaton {{")?;
    writeln!(out, "  rankdir = LR;")?;
    writeln!(out, "  stop [shape=doublecircle,label=\"\"];")?;
    writeln!(out, "  initial [shape=plaintext,label=\"\"];")?;

    if let Some(root) = fsa.root_node() {
        writeln!(out, "  initial -> {};", root)?;
    }

    let mut result = Ok(());
    visit_pre_order(fsa, |node| {
        result = write_node(fsa, node, &mut *out);
        result.is_ok()
    });
    result?;

    writeln!(out, "}}")
}

fn write_node<F: Fsa + ?Sized, W: Write>(fsa: &F, node: NodeIndex, out: &mut W) -> io::Result<()> {
    match fsa.right_language_count(node) {
        Some(count) => writeln!(out, "  {} [shape=circle,label=\"{}\"];", node, count)?,
        None => writeln!(out, "  {} [shape=circle,label=\"\"];", node)?,
    }

    for arc in fsa.arcs(node) {
        let target = match fsa.end_node(arc) {
            Some(target) => target.to_string(),
            None => "stop".to_string(),
        };
        let style = if fsa.is_arc_final(arc) { ",style=bold" } else { "" };
        writeln!(
            out,
            "  {} -> {} [label=\"{}\"{}];",
            node,
            target,
            printable(fsa.arc_label(arc)),
            style
        )?;
    }
    Ok(())
}

fn printable(label: u8) -> String {
    if label.is_ascii_alphanumeric() {
        (label as char).to_string()
    } else {
        format!("0x{:02x}", label)
    }
}
