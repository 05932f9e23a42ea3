use crate::error::{self, Error};

/// Simple email envelope representation
///
/// The addresses are bare (`user@domain`), display names and angle brackets
/// are stripped when the envelope is built from headers.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Envelope {
    /// The envelope recipients' addresses
    ///
    /// This can not be empty.
    forward_path: Vec<String>,
    /// The envelope sender address
    reverse_path: String,
}

impl Envelope {
    /// Creates a new envelope, which may fail if `from` or `to` is empty.
    ///
    /// ```
    /// # use courier::Envelope;
    /// let envelope = Envelope::new("from@example.com", vec!["to@example.com".to_owned()])?;
    /// assert_eq!(envelope.from(), "from@example.com");
    /// assert_eq!(envelope.to(), ["to@example.com"]);
    /// # Ok::<(), courier::Error>(())
    /// ```
    pub fn new(from: impl Into<String>, to: Vec<String>) -> Result<Envelope, Error> {
        let from = from.into();
        if from.trim().is_empty() {
            return Err(error::missing_from());
        }
        if to.is_empty() {
            return Err(error::missing_to());
        }
        Ok(Envelope {
            forward_path: to,
            reverse_path: from,
        })
    }

    /// Gets the destination addresses of the envelope.
    pub fn to(&self) -> &[String] {
        self.forward_path.as_slice()
    }

    /// Gets the sender of the envelope.
    pub fn from(&self) -> &str {
        &self.reverse_path
    }

    /// Check if any of the addresses in the envelope contains non-ascii chars
    pub(crate) fn has_non_ascii_addresses(&self) -> bool {
        !self.reverse_path.is_ascii() || self.forward_path.iter().any(|a| !a.is_ascii())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_parts_are_rejected() {
        assert!(Envelope::new("", vec!["a@example.com".to_owned()])
            .unwrap_err()
            .is_missing_from());
        assert!(Envelope::new("a@example.com", vec![])
            .unwrap_err()
            .is_missing_to());
    }

    #[test]
    fn non_ascii() {
        let envelope = Envelope::new("a@example.com", vec!["b@example.com".to_owned()]).unwrap();
        assert!(!envelope.has_non_ascii_addresses());
        let envelope = Envelope::new("a@example.com", vec!["jörg@example.com".to_owned()]).unwrap();
        assert!(envelope.has_non_ascii_addresses());
    }
}
