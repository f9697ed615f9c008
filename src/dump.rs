//! Transform hierarchy dump
//!
//! Walks an archive from its top object and prints every transform node with
//! its operations, local matrix and accumulated world matrix.
//!
//! Two walks cooperate. [`Dumper::find_and_dump`] searches for nodes whose name
//! contains the filter and hands each match to [`Dumper::dump_xform`], which
//! prints the whole subtree below it without filtering.
//!
//! # Example
//!
//! ```no_run
//! use abcxform::{Archive, DumpConfig, Dumper};
//!
//! let archive = Archive::open("scene.abc")?;
//! let config = DumpConfig::new().with_filter("wheel");
//! let mut dumper = Dumper::new(std::io::stdout().lock(), config);
//! dumper.run(&archive)?;
//! # Ok::<(), abcxform::Error>(())
//! ```

use std::io::Write;

use log::trace;

use crate::archive::{Archive, Object};
use crate::error::Result;
use crate::math::{self, M44d};
use crate::xform::{SampleSelector, Xform, XformSample};

/// What to print and which sample to read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DumpConfig {
    filter: Option<String>,
    selector: SampleSelector,
}

impl DumpConfig {
    /// Print every transform node at sample 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Only print subtrees rooted at transform nodes whose name contains
    /// `filter`; an empty filter matches everything
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.filter = (!filter.is_empty()).then_some(filter);
        self
    }

    /// Read the sample picked by `selector` instead of sample 0
    pub fn with_selector(mut self, selector: SampleSelector) -> Self {
        self.selector = selector;
        self
    }

    /// The active filter, if any
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// The sample selector
    pub fn selector(&self) -> SampleSelector {
        self.selector
    }

    fn matches(&self, name: &str) -> bool {
        self.filter.as_deref().is_none_or(|f| name.contains(f))
    }
}

/// A transform node evaluated at the selected sample
struct Evaluated {
    sample: XformSample,
    local: M44d,
    world: M44d,
}

/// Writes the dump of an archive to `W`
pub struct Dumper<W: Write> {
    out: W,
    config: DumpConfig,
    // Channel values switch to fixed notation once a matrix has been printed
    fixed: bool,
}

impl<W: Write> Dumper<W> {
    /// Create a dumper writing to `out`
    pub fn new(out: W, config: DumpConfig) -> Self {
        Self {
            out,
            config,
            fixed: false,
        }
    }

    /// The configuration in use
    pub fn config(&self) -> &DumpConfig {
        &self.config
    }

    /// Recover the output
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print the preamble and every matching transform node of `archive`
    pub fn run(&mut self, archive: &Archive) -> Result<()> {
        writeln!(self.out, "Archive: {}", archive.name())?;
        writeln!(
            self.out,
            "Filter: {}",
            self.config.filter().unwrap_or("(none)")
        )?;
        writeln!(self.out)?;

        let top = archive.top()?;
        self.find_and_dump(&top, &math::identity(), 0)?;
        self.out.flush()?;
        Ok(())
    }

    fn evaluate(&self, object: &Object, parent_world: &M44d) -> Result<Option<Evaluated>> {
        if !Xform::matches(object.metadata()) {
            return Ok(None);
        }
        let xform = Xform::new(object)?;
        let sample = xform.sample(self.config.selector)?;
        let local = sample.matrix();
        let world = if sample.inherits() {
            local * parent_world
        } else {
            local
        };
        Ok(Some(Evaluated {
            sample,
            local,
            world,
        }))
    }

    /// Search below `object` for nodes matching the filter
    ///
    /// Depth never changes during the search. A match is printed with its
    /// parent's world matrix and the search does not descend further; other
    /// transform nodes pass their world matrix on to their children.
    pub fn find_and_dump(&mut self, object: &Object, parent_world: &M44d, depth: usize) -> Result<()> {
        trace!("Searching {}", object.full_name());

        let mut world = *parent_world;
        if let Some(node) = self.evaluate(object, parent_world)? {
            if self.config.matches(object.name()) {
                return self.dump_xform(object, parent_world, depth);
            }
            world = node.world;
        }

        for child in object.children() {
            self.find_and_dump(&child?, &world, depth)?;
        }
        Ok(())
    }

    /// Print `object` and everything below it
    ///
    /// Transform nodes print a block and indent their children one level
    /// deeper. Other objects are transparent: their children inherit the same
    /// world matrix and depth.
    pub fn dump_xform(&mut self, object: &Object, parent_world: &M44d, depth: usize) -> Result<()> {
        match self.evaluate(object, parent_world)? {
            Some(node) => {
                trace!("Dumping {} at depth {}", object.full_name(), depth);
                self.write_node(object.name(), &node, depth)?;
                for child in object.children() {
                    self.dump_xform(&child?, &node.world, depth + 1)?;
                }
            }
            None => {
                for child in object.children() {
                    self.dump_xform(&child?, parent_world, depth)?;
                }
            }
        }
        Ok(())
    }

    fn write_node(&mut self, name: &str, node: &Evaluated, depth: usize) -> Result<()> {
        let indent = " ".repeat(depth * 2);

        writeln!(
            self.out,
            "{}[XFORM] {} (inherits={})",
            indent,
            name,
            node.sample.inherits()
        )?;
        writeln!(self.out, "{}  ops: {}", indent, node.sample.num_ops())?;
        for (i, op) in node.sample.ops().iter().enumerate() {
            let vals = op
                .channels()
                .iter()
                .map(|&v| self.format_channel(v))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(
                self.out,
                "{}    [{}] type={} hint={} vals=[{}]",
                indent,
                i,
                op.op_type().code(),
                op.hint(),
                vals
            )?;
        }

        self.write_matrix(&indent, "local matrix", &node.local)?;
        self.write_matrix(&indent, "world matrix", &node.world)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn write_matrix(&mut self, indent: &str, label: &str, m: &M44d) -> Result<()> {
        writeln!(self.out, "{}  {}:", indent, label)?;
        for row in 0..4 {
            write!(self.out, "{}    [", indent)?;
            for col in 0..4 {
                write!(self.out, "{:>10}", format_fixed(m[(row, col)]))?;
            }
            writeln!(self.out, "]")?;
        }
        self.fixed = true;
        Ok(())
    }

    fn format_channel(&self, value: f64) -> String {
        if self.fixed {
            format_fixed(value)
        } else {
            format_general(value)
        }
    }
}

/// Dump `archive` into a string
pub fn dump_to_string(archive: &Archive, config: DumpConfig) -> Result<String> {
    let mut dumper = Dumper::new(Vec::new(), config);
    dumper.run(archive)?;
    Ok(String::from_utf8_lossy(&dumper.into_inner()).into_owned())
}

fn format_non_finite(value: f64) -> Option<String> {
    let text = if value.is_nan() {
        "nan"
    } else if value.is_infinite() {
        "inf"
    } else {
        return None;
    };
    // printf keeps the sign bit of a NaN
    if value.is_sign_negative() {
        Some(format!("-{}", text))
    } else {
        Some(text.to_string())
    }
}

/// Fixed notation with four decimals (`%.4f`)
pub fn format_fixed(value: f64) -> String {
    format_non_finite(value).unwrap_or_else(|| format!("{:.4}", value))
}

/// General notation with six significant digits (`%g`)
pub fn format_general(value: f64) -> String {
    const PRECISION: i32 = 6;

    if let Some(text) = format_non_finite(value) {
        return text;
    }

    // Rounding to the target precision decides the exponent
    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..PRECISION).contains(&exponent) {
        let decimals = (PRECISION - 1 - exponent) as usize;
        strip_zeros(format!("{:.*}", decimals, value))
    } else {
        format!(
            "{}e{}{:02}",
            strip_zeros(mantissa.to_string()),
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        )
    }
}

fn strip_zeros(mut text: String) -> String {
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    text
}
