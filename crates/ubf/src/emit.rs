use std::fmt::{self, Display, Formatter};

use ahash::HashMap;
use itertools::Itertools;

use crate::{Participant, ReactionSpec, Side};

/// A compiled network, rendered as the text read by the FTBL converter
#[derive(Copy, Clone, Debug)]
pub struct Network<'a> {
    reactions: &'a [ReactionSpec],
    banner: Option<&'a str>,
}

impl<'a> Network<'a> {
    pub const fn new(reactions: &'a [ReactionSpec], banner: Option<&'a str>) -> Self {
        Self { reactions, banner }
    }
}

/// Renders `reactions` one record per line, after `banner` (if any) as a block of `#` comments
pub fn render_network(reactions: &[ReactionSpec], banner: Option<&str>) -> String {
    Network::new(reactions, banner).to_string()
}

impl Display for Network<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if let Some(banner) = self.banner {
            for line in banner.lines() {
                writeln!(f, "# {line}")?;
            }
            writeln!(f)?;
        }
        for reaction in self.reactions {
            writeln!(f, "{reaction}")?;
        }
        Ok(())
    }
}

impl Display for ReactionSpec {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if let Some(full_name) = &self.full_name {
            writeln!(f, "# {full_name}")?;
        }
        write!(
            f,
            "{}:\t{} {} {}",
            self.short_name, self.left, self.separator, self.right
        )
    }
}

// NOTE: Identical participants on the same side are told apart by numbering their labels, as in `CO2 (a#1) + CO2
// (a#2)`
impl Display for Side {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let counts = self.iter().counts();
        let mut seen: HashMap<&Participant, usize> = HashMap::default();
        let terms = self.iter().map(|participant| {
            if counts[participant] > 1 {
                let occurrence = seen.entry(participant).or_default();
                *occurrence += 1;
                format!(
                    "{} ({}#{occurrence})",
                    participant.metabolite, participant.label
                )
            } else {
                participant.to_string()
            }
        });
        write!(f, "{}", terms.format(" + "))
    }
}

impl Display for Participant {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.metabolite, self.label)
    }
}
