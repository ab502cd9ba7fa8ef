//! Protocol id lists.

use std::ops::Deref;

/// One or more protocol ids, in order of preference.
///
/// Single ids are normalised into a one-element list so APIs can accept
/// either form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Protocols(Vec<String>);

impl Protocols {
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl Deref for Protocols {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for Protocols {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for Protocols {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<&String> for Protocols {
    fn from(value: &String) -> Self {
        Self(vec![value.clone()])
    }
}

impl From<Vec<String>> for Protocols {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<&[String]> for Protocols {
    fn from(value: &[String]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Vec<&str>> for Protocols {
    fn from(value: Vec<&str>) -> Self {
        value.into_iter().collect()
    }
}

impl From<&[&str]> for Protocols {
    fn from(value: &[&str]) -> Self {
        value.iter().copied().collect()
    }
}

impl<const N: usize> From<[&str; N]> for Protocols {
    fn from(value: [&str; N]) -> Self {
        value.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for Protocols {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Returns true if any protocol in `protocols` is one of `wanted`.
pub fn intersects<A, B>(protocols: &[A], wanted: &[B]) -> bool
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    protocols
        .iter()
        .any(|p| wanted.iter().any(|w| w.as_ref() == p.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_protocol_normalised() {
        let protocols = Protocols::from("/echo/1.0.0");
        assert_eq!(&*protocols, &["/echo/1.0.0".to_string()]);
    }

    #[test]
    fn test_list_keeps_order() {
        let protocols = Protocols::from(["/b/1.0.0", "/a/1.0.0"]);
        assert_eq!(protocols.into_vec(), vec!["/b/1.0.0", "/a/1.0.0"]);
    }

    #[test]
    fn test_intersects() {
        assert!(intersects(&["/a", "/b"][..], &["/b"][..]));
        assert!(!intersects(&["/a"][..], &["/b", "/c"][..]));
        assert!(!intersects::<&str, &str>(&[], &["/b"]));
    }
}
