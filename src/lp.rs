//! CPLEX LP-format export, for inspecting a model or feeding it to another solver.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};

use crate::model::{Comparison, LinearExpr, MilpModel, VarKey, VarKind};

/// Write `model` in LP format.
///
/// Ids may hold any characters, so variables are written as `v0, v1, ...` and
/// rows as `c0, c1, ...` in model order. A comment block at the top maps them
/// back to `x[r,t]`, `y[g]` and the constraint names. Rows without variables
/// (a resource that can perform nothing) hold trivially and are left out.
pub fn write_lp(model: &MilpModel, mut out: impl Write) -> io::Result<()> {
    let names: HashMap<&VarKey, String> = model
        .variables()
        .iter()
        .enumerate()
        .map(|(i, def)| (&def.key, format!("v{i}")))
        .collect();

    writeln!(out, "\\ resource to task assignment")?;
    for def in model.variables() {
        writeln!(out, "\\ {} = {}", names[&def.key], def.key)?;
    }
    for (i, c) in model.constraints().iter().enumerate() {
        writeln!(out, "\\ c{i} = {}", c.name)?;
    }

    writeln!(out, "Minimize")?;
    writeln!(out, " obj: {}", format_expr(model.objective(), &names))?;

    writeln!(out, "Subject To")?;
    for (i, c) in model.constraints().iter().enumerate() {
        if c.lhs.terms.is_empty() && c.is_satisfied(&BTreeMap::new(), 0.0) {
            writeln!(out, "\\ c{i} has no variables, skipped")?;
            continue;
        }
        let cmp = match c.cmp {
            Comparison::Eq => "=",
            Comparison::Leq => "<=",
            Comparison::Geq => ">=",
        };
        writeln!(
            out,
            " c{i}: {} {cmp} {}",
            format_expr(&c.lhs, &names),
            c.rhs
        )?;
    }

    writeln!(out, "Bounds")?;
    for def in model.variables() {
        if def.kind == VarKind::NonNegativeInteger {
            writeln!(out, " {} >= 0", names[&def.key])?;
        }
    }

    write_section(&mut out, "Binaries", model, VarKind::Binary, &names)?;
    write_section(&mut out, "Generals", model, VarKind::NonNegativeInteger, &names)?;
    writeln!(out, "End")
}

fn write_section(
    out: &mut impl Write,
    header: &str,
    model: &MilpModel,
    kind: VarKind,
    names: &HashMap<&VarKey, String>,
) -> io::Result<()> {
    writeln!(out, "{header}")?;
    for def in model.variables().iter().filter(|d| d.kind == kind) {
        writeln!(out, " {}", names[&def.key])?;
    }
    Ok(())
}

fn format_expr(expr: &LinearExpr, names: &HashMap<&VarKey, String>) -> String {
    if expr.terms.is_empty() {
        return "0".to_owned();
    }
    let mut s = String::new();
    for (i, (key, coefficient)) in expr.terms.iter().enumerate() {
        let sign = if *coefficient < 0.0 { "-" } else { "+" };
        if i > 0 || *coefficient < 0.0 {
            s.push_str(sign);
            s.push(' ');
        }
        s.push_str(&format!("{} {}", coefficient.abs(), names[key]));
        if i + 1 < expr.terms.len() {
            s.push(' ');
        }
    }
    s
}
