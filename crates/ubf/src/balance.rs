//! Pairs every metabolite with an atom label, inventing boundary and carbon-filler metabolites where a reaction
//! leaves them implicit

use std::{cmp::Ordering, collections::BTreeSet};

use itertools::Itertools;

use crate::{AtomLabel, Participant, Side, SideKind, parsers::errors::ReactionErrorKind};

/// The metabolites and atom label groups of both sides of a reaction, before they've been paired up
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Equation {
    pub left_names: Vec<String>,
    pub left_labels: Vec<AtomLabel>,
    pub right_names: Vec<String>,
    pub right_labels: Vec<AtomLabel>,
}

const UPTAKE: &str = "_in";
const SECRETION: &str = "_sink";

/// Builds the two [`Side`]s of a reaction, so that every metabolite has a label and both sides carry the same
/// number of carbons
///
/// A side without any metabolites takes up (`_in`) or secretes (`_sink`) everything on the other side. Missing
/// metabolite names are filled by repeating the last one when every label group has the same length. Finally, any
/// difference in carbon count is closed by a `_c<N>_in` or `_c<N>_sink` metabolite on the shorter side, labelled
/// with the carbons it lacks.
///
/// # Errors
///
/// Fails if neither side names a metabolite, if names and labels can't be paired, or if the missing carbons can't
/// be worked out from the labels.
pub fn balance(equation: Equation) -> Result<(Side, Side), ReactionErrorKind> {
    let Equation {
        mut left_names,
        mut left_labels,
        mut right_names,
        mut right_labels,
    } = equation;

    match (left_names.is_empty(), right_names.is_empty()) {
        (true, true) => return Err(ReactionErrorKind::MissingMetabolites),
        (true, false) => {
            align(SideKind::Right, &mut right_names, &right_labels)?;
            left_names = boundary(&right_names, UPTAKE);
            left_labels.clone_from(&right_labels);
        }
        (false, true) => {
            align(SideKind::Left, &mut left_names, &left_labels)?;
            right_names = boundary(&left_names, SECRETION);
            right_labels.clone_from(&left_labels);
        }
        (false, false) => {
            align(SideKind::Left, &mut left_names, &left_labels)?;
            align(SideKind::Right, &mut right_names, &right_labels)?;
        }
    }

    let left_carbons = carbons(&left_labels);
    let right_carbons = carbons(&right_labels);
    let unbalanced = || ReactionErrorKind::Unbalanced {
        left: left_carbons,
        right: right_carbons,
    };
    match left_carbons.cmp(&right_carbons) {
        Ordering::Less => {
            let missing = right_carbons - left_carbons;
            let filler = filler(&right_labels, &left_labels, missing).ok_or_else(unbalanced)?;
            left_names.push(format!("_c{missing}{UPTAKE}"));
            left_labels.push(filler);
        }
        Ordering::Greater => {
            let missing = left_carbons - right_carbons;
            let filler = filler(&left_labels, &right_labels, missing).ok_or_else(unbalanced)?;
            right_names.push(format!("_c{missing}{SECRETION}"));
            right_labels.push(filler);
        }
        Ordering::Equal => (),
    }

    Ok((pair(left_names, left_labels), pair(right_names, right_labels)))
}

fn boundary(names: &[String], suffix: &str) -> Vec<String> {
    names.iter().map(|name| format!("{name}{suffix}")).collect()
}

fn align(side: SideKind, names: &mut Vec<String>, labels: &[AtomLabel]) -> Result<(), ReactionErrorKind> {
    if names.len() < labels.len() && labels.iter().map(AtomLabel::len).all_equal() {
        if let Some(last) = names.last().cloned() {
            names.resize(labels.len(), last);
        }
    }

    if names.len() == labels.len() {
        Ok(())
    } else {
        Err(ReactionErrorKind::Alignment {
            side,
            names: names.len(),
            labels: labels.len(),
        })
    }
}

fn carbons(labels: &[AtomLabel]) -> usize {
    labels.iter().map(AtomLabel::len).sum()
}

// NOTE: The filler carries every carbon seen on the longer side but never on the shorter one, so it's only usable
// when that accounts for exactly the missing carbons
fn filler(longer: &[AtomLabel], shorter: &[AtomLabel], missing: usize) -> Option<AtomLabel> {
    let present: BTreeSet<_> = shorter.iter().flat_map(AtomLabel::chars).collect();
    let label: AtomLabel = longer
        .iter()
        .flat_map(AtomLabel::chars)
        .collect::<BTreeSet<_>>()
        .difference(&present)
        .copied()
        .collect();
    (label.len() == missing).then_some(label)
}

fn pair(names: Vec<String>, labels: Vec<AtomLabel>) -> Side {
    names
        .into_iter()
        .zip(labels)
        .map(|(name, label)| Participant::new(name, label))
        .collect()
}
