use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// --- Permission Names ---

pub const READ_USER: &str = "read_user";
pub const UPDATE_USER: &str = "update_user";

pub const CREATE_BLOG: &str = "create_blog";
pub const READ_BLOG: &str = "read_blog";
pub const UPDATE_BLOG: &str = "update_blog";
pub const DELETE_BLOG: &str = "delete_blog";

/// PermissionSet
///
/// The effective permissions of one identity: the union of every role it holds.
/// It is a set, so membership is all that matters. Internally ordered so that tokens
/// built from equal sets serialize identically.
///
/// Wire form is a JSON array of strings. For compatibility with tokens that encode the
/// set as an object, deserialization also accepts `{"create_blog": true, ...}`; keys
/// whose value is `false` are not members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for PermissionSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for PermissionSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PermissionWire {
    List(Vec<String>),
    Object(BTreeMap<String, serde_json::Value>),
}

impl<'de> Deserialize<'de> for PermissionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match PermissionWire::deserialize(deserializer)? {
            PermissionWire::List(list) => list.into_iter().collect(),
            PermissionWire::Object(map) => map
                .into_iter()
                .filter(|(_, granted)| *granted != serde_json::Value::Bool(false))
                .map(|(name, _)| name)
                .collect(),
        })
    }
}

// --- Type-level Permission Requirements ---

/// RequiredPermission
///
/// Names, at the type level, the permission a route demands. Used as the parameter of
/// the `Authorized<P>` extractor so each handler signature states its own requirement.
pub trait RequiredPermission: Send + Sync + 'static {
    const NAME: &'static str;
}

macro_rules! required_permissions {
    ($($marker:ident => $name:expr),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy)]
            pub struct $marker;

            impl RequiredPermission for $marker {
                const NAME: &'static str = $name;
            }
        )*
    };
}

required_permissions! {
    ReadUser => READ_USER,
    UpdateUser => UPDATE_USER,
    CreateBlog => CREATE_BLOG,
    ReadBlog => READ_BLOG,
    UpdateBlog => UPDATE_BLOG,
    DeleteBlog => DELETE_BLOG,
}
