// Sensor tree
//
// `table.xml?content=sensortree` returns the whole object hierarchy below
// an id as nested elements: groups contain probes, groups and devices;
// devices contain sensors. Children are owned by their parent node; the
// way back up is the `parent_id` lookup key, never a reference.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::IntoEnumIterator;
use tracing::trace;

use crate::models::Scalar;
use crate::normalize::{HasDisplayFields, HasIdentifier, Paired, pair_fields};

/// Kind of a tree node, named after its element tag.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    Group,
    Probe,
    Device,
    Sensor,
}

impl NodeKind {
    /// Element name in `table.xml?content=sensortree`.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Probe => "probenode",
            Self::Device => "device",
            Self::Sensor => "sensor",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        if tag == "probe" {
            return Some(Self::Probe);
        }
        Self::iter().find(|kind| kind.tag() == tag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub object_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    pub fields: BTreeMap<String, Paired>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn status(&self) -> Option<&Paired> {
        self.fields.get("status")
    }

    /// This node and all descendants, depth first.
    pub fn walk(&self) -> Vec<&TreeNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

impl HasIdentifier for TreeNode {
    fn object_id(&self) -> i64 {
        self.object_id
    }

    fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }
}

impl HasDisplayFields for TreeNode {
    fn fields(&self) -> &BTreeMap<String, Paired> {
        &self.fields
    }
}

/// The object hierarchy below one root id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorTree {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prtg_version: Option<String>,
    pub nodes: Vec<TreeNode>,
}

impl SensorTree {
    /// Every node, depth first.
    pub fn walk(&self) -> Vec<&TreeNode> {
        self.nodes.iter().flat_map(TreeNode::walk).collect()
    }

    pub fn find(&self, object_id: i64) -> Option<&TreeNode> {
        self.walk().into_iter().find(|n| n.object_id == object_id)
    }

    pub fn sensors(&self) -> Vec<&TreeNode> {
        self.walk()
            .into_iter()
            .filter(|n| n.kind == NodeKind::Sensor)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Build a tree from a decoded payload (XML fold or JSON).
///
/// Nodes without an id are dropped along with their subtree.
pub fn normalize_tree(value: &Value) -> SensorTree {
    let prtg_version = ["prtg-version", "prtgversion", "version"]
        .iter()
        .find_map(|k| value.get(*k))
        .and_then(Scalar::from_value)
        .map(|s| s.to_string());

    let container = value
        .get("sensortree")
        .and_then(|t| t.get("nodes"))
        .or_else(|| value.get("nodes"))
        .unwrap_or(value);

    let nodes = container
        .as_object()
        .map(|obj| parse_children(obj, None))
        .unwrap_or_default();

    SensorTree {
        prtg_version,
        nodes,
    }
}

fn parse_children(container: &Map<String, Value>, parent_id: Option<i64>) -> Vec<TreeNode> {
    let mut nodes = Vec::new();
    for (tag, value) in container {
        let Some(kind) = NodeKind::from_tag(tag) else {
            continue;
        };
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        nodes.extend(
            items
                .into_iter()
                .filter_map(Value::as_object)
                .filter_map(|obj| parse_node(kind, obj, parent_id)),
        );
    }
    nodes
}

fn parse_node(
    kind: NodeKind,
    object: &Map<String, Value>,
    parent_id: Option<i64>,
) -> Option<TreeNode> {
    let own: Map<String, Value> = object
        .iter()
        .filter(|(k, _)| NodeKind::from_tag(k).is_none())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let fields = pair_fields(&own);

    let Some(object_id) = fields
        .get("id")
        .or_else(|| fields.get("objid"))
        .and_then(Paired::integer)
    else {
        trace!(%kind, "dropping tree node without id");
        return None;
    };
    let name = fields.get("name").and_then(Paired::text).unwrap_or_default();
    let children = parse_children(object, Some(object_id));

    Some(TreeNode {
        kind,
        object_id,
        name,
        parent_id,
        fields,
        children,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::xml;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn tags_map_back_to_kinds() {
        for kind in NodeKind::iter() {
            assert_eq!(NodeKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(NodeKind::from_tag("probe"), Some(NodeKind::Probe));
        assert_eq!(NodeKind::from_tag("channel"), None);
    }

    const TREE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<prtg>
  <prtg-version>24.1.90.1306</prtg-version>
  <sensortree>
    <nodes>
      <group id="0" noaccess="0">
        <name>Root</name>
        <probenode id="1">
          <name>Local Probe</name>
          <device id="40">
            <name>core-switch</name>
            <sensor id="2001">
              <name>Ping</name>
              <status>Up</status>
              <status_raw>3</status_raw>
            </sensor>
            <sensor id="2002">
              <name>Traffic</name>
              <status>Down</status>
              <status_raw>5</status_raw>
            </sensor>
          </device>
        </probenode>
      </group>
    </nodes>
  </sensortree>
</prtg>"#;

    #[test]
    fn xml_tree_nests_and_links_parents() {
        let value = xml::to_value(TREE_XML.as_bytes(), true).unwrap();
        let tree = normalize_tree(&value);

        assert_eq!(tree.prtg_version.as_deref(), Some("24.1.90.1306"));
        assert_eq!(tree.nodes.len(), 1);
        let root = &tree.nodes[0];
        assert_eq!(root.kind, NodeKind::Group);
        assert_eq!(root.name, "Root");
        assert_eq!(root.parent_id, None);

        let ids: Vec<i64> = tree.walk().iter().map(|n| n.object_id).collect();
        assert_eq!(ids, [0, 1, 40, 2001, 2002]);

        let traffic = tree.find(2002).unwrap();
        assert_eq!(traffic.parent_id, Some(40));
        assert_eq!(traffic.status().and_then(Paired::integer), Some(5));
        assert_eq!(traffic.display("status").as_deref(), Some("Down"));
        assert_eq!(tree.sensors().len(), 2);
    }

    #[test]
    fn json_tree_with_single_children() {
        let tree = normalize_tree(&json!({
            "prtgversion": "24.1",
            "sensortree": { "nodes": { "device": {
                "id": 40,
                "name": "core-switch",
                "sensor": { "id": "2001", "name": "Ping" }
            }}}
        }));
        assert_eq!(tree.walk().len(), 2);
        assert_eq!(tree.find(2001).unwrap().parent_id, Some(40));
    }

    #[test]
    fn empty_tree_is_ok() {
        let tree =
            normalize_tree(&json!({ "prtg-version": "24.1", "sensortree": { "nodes": "" } }));
        assert!(tree.is_empty());
    }

    #[test]
    fn nodes_without_id_are_dropped() {
        let payload = json!({ "nodes": { "sensor": [{ "name": "anon" }, { "id": 9, "name": "ok" }] } });
        let tree = normalize_tree(&payload);
        assert_eq!(tree.walk().len(), 1);
        assert_eq!(tree.nodes[0].name, "ok");
    }
}
