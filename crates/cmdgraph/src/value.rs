//! Typed values for symbol members.
//!
//! A member's Rust type decides how it is parsed and bound:
//!
//! | member type    | shape    | clap action | inferred required |
//! |----------------|----------|-------------|-------------------|
//! | `bool`         | flag     | `SetTrue`   | never             |
//! | `T`            | scalar   | `Set`       | unless defaulted  |
//! | `Option<T>`    | nullable | `Set`       | never             |
//! | `Vec<T>`       | sequence | `Append`    | unless defaulted  |
//!
//! `T` is any [`ScalarValue`]. Implement it for your own types with
//! [`scalar_value!`](crate::scalar_value).

use std::fmt::Debug;
use std::path::PathBuf;

use clap::builder::ValueParser;
use clap::ArgMatches;

/// How a member's type maps onto the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Flag,
    Scalar,
    Nullable,
    Sequence,
}

impl ValueShape {
    pub fn is_sequence(self) -> bool {
        self == ValueShape::Sequence
    }
}

/// A single parsed value.
pub trait ScalarValue: Clone + Debug + Send + Sync + 'static {
    /// Flags take no value on the command line.
    const IS_FLAG: bool = false;

    fn value_parser() -> ValueParser;
}

/// A member type the binder knows how to fill from parse results.
pub trait MemberValue: Clone + Debug + Send + Sync + 'static {
    const SHAPE: ValueShape;

    fn value_parser() -> ValueParser;

    /// Reads the value stored under `id`, if any.
    fn extract(matches: &ArgMatches, id: &str) -> Option<Self>;

    /// Value used for a method parameter that received nothing and has no
    /// declared default.
    fn absent() -> Option<Self> {
        None
    }
}

/// Implements [`ScalarValue`] and [`MemberValue`] for types clap can parse
/// (anything `FromStr + Clone + Send + Sync`, or a `ValueEnum`).
#[macro_export]
macro_rules! scalar_value {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::ScalarValue for $t {
                fn value_parser() -> $crate::clap::builder::ValueParser {
                    $crate::clap::value_parser!($t).into()
                }
            }

            impl $crate::MemberValue for $t {
                const SHAPE: $crate::ValueShape = $crate::ValueShape::Scalar;

                fn value_parser() -> $crate::clap::builder::ValueParser {
                    <$t as $crate::ScalarValue>::value_parser()
                }

                fn extract(matches: &$crate::clap::ArgMatches, id: &str) -> Option<Self> {
                    matches.try_get_one::<$t>(id).ok().flatten().cloned()
                }
            }
        )+
    };
}

scalar_value!(String, PathBuf, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl ScalarValue for bool {
    const IS_FLAG: bool = true;

    fn value_parser() -> ValueParser {
        ValueParser::bool()
    }
}

impl MemberValue for bool {
    const SHAPE: ValueShape = ValueShape::Flag;

    fn value_parser() -> ValueParser {
        ValueParser::bool()
    }

    fn extract(matches: &ArgMatches, id: &str) -> Option<Self> {
        matches.try_get_one::<bool>(id).ok().flatten().copied()
    }

    fn absent() -> Option<Self> {
        Some(false)
    }
}

impl<T: ScalarValue> MemberValue for Option<T> {
    const SHAPE: ValueShape = ValueShape::Nullable;

    fn value_parser() -> ValueParser {
        T::value_parser()
    }

    fn extract(matches: &ArgMatches, id: &str) -> Option<Self> {
        matches
            .try_get_one::<T>(id)
            .ok()
            .flatten()
            .cloned()
            .map(Some)
    }

    fn absent() -> Option<Self> {
        Some(None)
    }
}

impl<T: ScalarValue> MemberValue for Vec<T> {
    const SHAPE: ValueShape = ValueShape::Sequence;

    fn value_parser() -> ValueParser {
        T::value_parser()
    }

    fn extract(matches: &ArgMatches, id: &str) -> Option<Self> {
        matches
            .try_get_many::<T>(id)
            .ok()
            .flatten()
            .map(|values| values.cloned().collect())
    }

    fn absent() -> Option<Self> {
        Some(Vec::new())
    }
}

/// A member filled from directive occurrences.
///
/// Each occurrence is `[name]` (no value) or `[name:value]`.
pub trait DirectiveValue: Clone + Debug + Send + Sync + 'static {
    fn from_occurrences(values: &[Option<String>]) -> Option<Self>;

    fn absent() -> Option<Self> {
        None
    }
}

impl DirectiveValue for bool {
    fn from_occurrences(values: &[Option<String>]) -> Option<Self> {
        (!values.is_empty()).then_some(true)
    }

    fn absent() -> Option<Self> {
        Some(false)
    }
}

impl DirectiveValue for Option<String> {
    fn from_occurrences(values: &[Option<String>]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().rev().find_map(Clone::clone))
    }

    fn absent() -> Option<Self> {
        Some(None)
    }
}

impl DirectiveValue for Vec<String> {
    fn from_occurrences(values: &[Option<String>]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().flatten().cloned().collect())
    }

    fn absent() -> Option<Self> {
        Some(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction, Command};

    fn matches_for(arg: Arg, args: &[&str]) -> ArgMatches {
        Command::new("test")
            .no_binary_name(true)
            .arg(arg)
            .try_get_matches_from(args)
            .unwrap()
    }

    #[test]
    fn test_shapes() {
        assert_eq!(<bool as MemberValue>::SHAPE, ValueShape::Flag);
        assert_eq!(<String as MemberValue>::SHAPE, ValueShape::Scalar);
        assert_eq!(<Option<u32> as MemberValue>::SHAPE, ValueShape::Nullable);
        assert_eq!(<Vec<PathBuf> as MemberValue>::SHAPE, ValueShape::Sequence);
    }

    #[test]
    fn test_extract_scalar() {
        let arg = Arg::new("count")
            .long("count")
            .value_parser(<u32 as MemberValue>::value_parser());
        let matches = matches_for(arg, &["--count", "7"]);
        assert_eq!(u32::extract(&matches, "count"), Some(7));
        assert_eq!(<Option<u32>>::extract(&matches, "count"), Some(Some(7)));
    }

    #[test]
    fn test_extract_sequence() {
        let arg = Arg::new("tag")
            .long("tag")
            .action(ArgAction::Append)
            .value_parser(<Vec<String> as MemberValue>::value_parser());
        let matches = matches_for(arg, &["--tag", "a", "--tag", "b"]);
        assert_eq!(
            <Vec<String>>::extract(&matches, "tag"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_extract_missing_is_none() {
        let arg = Arg::new("name").long("name");
        let matches = matches_for(arg, &[]);
        assert_eq!(String::extract(&matches, "name"), None);
        assert_eq!(String::extract(&matches, "unknown"), None);
    }

    #[test]
    fn test_absent_values() {
        assert_eq!(<bool as MemberValue>::absent(), Some(false));
        assert_eq!(<Option<String> as MemberValue>::absent(), Some(None));
        assert_eq!(<Vec<u8> as MemberValue>::absent(), Some(Vec::new()));
        assert_eq!(<String as MemberValue>::absent(), None);
    }

    #[test]
    fn test_directive_values() {
        let occurrences = vec![None, Some("a".to_string()), Some("b".to_string())];
        assert_eq!(bool::from_occurrences(&occurrences), Some(true));
        assert_eq!(bool::from_occurrences(&[]), None);
        assert_eq!(
            <Option<String>>::from_occurrences(&occurrences),
            Some(Some("b".to_string()))
        );
        assert_eq!(<Option<String>>::from_occurrences(&[None]), Some(None));
        assert_eq!(
            <Vec<String>>::from_occurrences(&occurrences),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }
}
