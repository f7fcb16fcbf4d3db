//! Indented text rendering of a group/entry tree.
//!
//! Line format, for a group at indentation `level`:
//!
//! ```text
//! <level spaces>***[<group title>]***
//! <level + 2 spaces>-<entry title>        (one per entry)
//! <children rendered at level + 4>
//! ```
//!
//! Entries are written before children, each in the order the node provides.
//! There is no cycle detection; the caller guarantees a finite tree.

use std::io::{self, Write};

/// Anything with a display title (entries, groups).
pub trait Titled {
    /// Display title.
    fn title(&self) -> &str;
}

/// A tree node holding ordered leaf entries and ordered child nodes.
pub trait GroupNode: Titled + Sized {
    /// Leaf entry type.
    type Leaf: Titled;

    /// Entries of this node, in display order.
    fn entries(&self) -> &[Self::Leaf];

    /// Child nodes, in display order.
    fn children(&self) -> &[Self];
}

/// Write the tree rooted at `node` to `w`, starting at indentation `level`.
pub fn write_group_tree<W, N>(w: &mut W, node: &N, level: usize) -> io::Result<()>
where
    W: Write + ?Sized,
    N: GroupNode,
{
    writeln!(w, "{:level$}***[{}]***", "", node.title())?;
    for e in node.entries() {
        writeln!(w, "{:indent$}-{}", "", e.title(), indent = level + 2)?;
    }
    for child in node.children() {
        write_group_tree(w, child, level + 4)?;
    }
    Ok(())
}

/// Print the tree rooted at `node` to standard output.
pub fn print_group_tree<N: GroupNode>(node: &N, level: usize) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_group_tree(&mut out, node, level)?;
    out.flush()
}
