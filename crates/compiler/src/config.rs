//! Pipeline configuration
//!
//! A mode names the pipeline prefix to run; the configuration carries the
//! optimization round count and the verbose-trace flags the resolve and
//! annotate passes honor. The optimization window (reduce, annotate,
//! inline, prune) defaults to one round for the modes that end inside it
//! and to zero for allocation and generation.

use std::str::FromStr;

/// Pipeline prefixes, in pass order. Each mode runs everything before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mode {
    Scan,
    Parse,
    Print,
    Resolve,
    Typecheck,
    Canonicalize,
    Reduce,
    Annotate,
    Inline,
    Prune,
    Allocate,
    Generate,
}

impl Mode {
    pub const ALL: [Mode; 12] = [
        Mode::Scan,
        Mode::Parse,
        Mode::Print,
        Mode::Resolve,
        Mode::Typecheck,
        Mode::Canonicalize,
        Mode::Reduce,
        Mode::Annotate,
        Mode::Inline,
        Mode::Prune,
        Mode::Allocate,
        Mode::Generate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Mode::Scan => "scan",
            Mode::Parse => "parse",
            Mode::Print => "print",
            Mode::Resolve => "resolve",
            Mode::Typecheck => "typecheck",
            Mode::Canonicalize => "canonicalize",
            Mode::Reduce => "reduce",
            Mode::Annotate => "annotate",
            Mode::Inline => "inline",
            Mode::Prune => "prune",
            Mode::Allocate => "allocate",
            Mode::Generate => "generate",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| format!("unknown mode '{}'", s))
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Rounds of the optimization window.
    pub opt_level: u32,
    /// Print the resolver's binding/lookup trace.
    pub verbose_resolve: bool,
    /// Print the annotator's per-event counter trace.
    pub verbose_annotate: bool,
}

impl Config {
    /// The configuration a mode implies: `-resolve` and `-annotate` trace
    /// themselves; modes ending inside the optimization window get one
    /// round unless `-O<n>` says otherwise; allocation and generation
    /// optimize only on request.
    pub fn for_mode(mode: Mode, opt_level: Option<u32>) -> Self {
        let opt_level = match mode {
            Mode::Reduce | Mode::Annotate | Mode::Inline | Mode::Prune => {
                match opt_level {
                    Some(n) if n > 0 => n,
                    _ => 1,
                }
            }
            Mode::Allocate | Mode::Generate => opt_level.unwrap_or(0),
            _ => 0,
        };
        Config {
            opt_level,
            verbose_resolve: mode == Mode::Resolve,
            verbose_annotate: mode == Mode::Annotate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("generate".parse::<Mode>().unwrap(), Mode::Generate);
        assert_eq!("canonicalize".parse::<Mode>().unwrap(), Mode::Canonicalize);
        assert!("optimize".parse::<Mode>().is_err());
    }

    #[test]
    fn test_mode_ordering_follows_pipeline() {
        assert!(Mode::Resolve < Mode::Typecheck);
        assert!(Mode::Reduce < Mode::Annotate);
        assert!(Mode::Prune < Mode::Generate);
    }

    #[test]
    fn test_opt_defaults() {
        assert_eq!(Config::for_mode(Mode::Reduce, None).opt_level, 1);
        assert_eq!(Config::for_mode(Mode::Reduce, Some(0)).opt_level, 1);
        assert_eq!(Config::for_mode(Mode::Prune, Some(3)).opt_level, 3);
        assert_eq!(Config::for_mode(Mode::Generate, None).opt_level, 0);
        assert_eq!(Config::for_mode(Mode::Generate, Some(2)).opt_level, 2);
        assert_eq!(Config::for_mode(Mode::Print, Some(5)).opt_level, 0);
    }

    #[test]
    fn test_verbose_flags() {
        assert!(Config::for_mode(Mode::Resolve, None).verbose_resolve);
        assert!(!Config::for_mode(Mode::Typecheck, None).verbose_resolve);
        assert!(Config::for_mode(Mode::Annotate, None).verbose_annotate);
        assert!(!Config::for_mode(Mode::Inline, None).verbose_annotate);
    }
}
