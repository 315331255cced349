//! TopicKey - Cheap-to-clone logical stream name
//!
//! Uses Arc<str> internally for O(1) clone operations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Topic identifier with cheap cloning.
///
/// Names one logical sub-stream (e.g. a camera) multiplexed over a transport
/// channel. Equality is an exact byte match. The empty key is the anonymous
/// slot used when a channel carries exactly one implicit topic.
///
/// # Examples
/// ```
/// use contracts::TopicKey;
///
/// let key: TopicKey = "left".into();
/// let key2 = key.clone();  // O(1) - just increments ref count
/// assert_eq!(key, key2);
/// assert_eq!(key.as_str(), "left");
/// assert!(TopicKey::anonymous().is_anonymous());
/// ```
#[derive(Clone)]
pub struct TopicKey(Arc<str>);

impl TopicKey {
    /// Create a new TopicKey from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// The implicit topic of a single-stream channel.
    #[inline]
    pub fn anonymous() -> Self {
        Self(Arc::from(""))
    }

    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }

    /// Map an optional topic to its slot, `None` being the anonymous slot.
    #[inline]
    pub fn from_option(topic: Option<TopicKey>) -> Self {
        topic.unwrap_or_default()
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes as they appear in the topic part of a message.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Default for TopicKey {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl Deref for TopicKey {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for TopicKey {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TopicKey {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TopicKey {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for TopicKey {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            f.write_str("<anonymous>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl fmt::Debug for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicKey({:?})", self.0)
    }
}

impl PartialEq for TopicKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Fast path: same Arc pointer
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for TopicKey {}

impl PartialEq<str> for TopicKey {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for TopicKey {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

// Hash - same as str hash for HashMap<TopicKey, _>::get(&str)
impl Hash for TopicKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Serialize for TopicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TopicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}
