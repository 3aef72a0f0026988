//! Deterministic disambiguation of proposed names.

/// Base used when the proposal is empty.
const DEFAULT_BASE: &str = "State";

/// Returns the first free name derived from `proposal`.
///
/// The proposal is trimmed. An empty proposal yields `"State #0"`,
/// `"State #1"`, ...; a non-empty one is returned unchanged when free and
/// otherwise suffixed with `" #1"`, `" #2"`, ... The lowest free counter
/// wins, so the loop ends after at most one more try than there are taken
/// names.
pub fn unique_name(proposal: &str, is_taken: impl Fn(&str) -> bool) -> String {
    let proposal = proposal.trim();
    let (base, mut counter) = if proposal.is_empty() {
        (DEFAULT_BASE, Some(0u32))
    } else {
        (proposal, None)
    };
    loop {
        let candidate = match counter {
            None => base.to_string(),
            Some(n) => format!("{base} #{n}"),
        };
        if !is_taken(&candidate) {
            return candidate;
        }
        counter = Some(counter.map_or(1, |n| n + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken<'a>(names: &'a [&'a str]) -> impl Fn(&str) -> bool + 'a {
        move |candidate| names.contains(&candidate)
    }

    #[test]
    fn empty_proposal_uses_default_base() {
        assert_eq!(unique_name("", taken(&[])), "State #0");
        assert_eq!(unique_name("  ", taken(&["State #0", "State #1"])), "State #2");
    }

    #[test]
    fn free_proposal_is_kept() {
        assert_eq!(unique_name(" Idle ", taken(&["State #0"])), "Idle");
    }

    #[test]
    fn collision_starts_at_one() {
        assert_eq!(unique_name("Idle", taken(&["Idle"])), "Idle #1");
        assert_eq!(unique_name("Idle", taken(&["Idle", "Idle #1"])), "Idle #2");
    }

    #[test]
    fn lowest_free_counter_wins() {
        assert_eq!(
            unique_name("", taken(&["State #0", "State #2"])),
            "State #1"
        );
    }
}
