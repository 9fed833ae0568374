//! Location tree: location, building, wing, floor, datacenter, then racks.

use std::collections::HashMap;

use db::models::{
    rack::Rack,
    site::{Site, SiteLevel},
};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    Location,
    Building,
    Wing,
    Floor,
    Datacenter,
    Rack,
}

impl From<SiteLevel> for NodeKind {
    fn from(level: SiteLevel) -> Self {
        match level {
            SiteLevel::Location => NodeKind::Location,
            SiteLevel::Building => NodeKind::Building,
            SiteLevel::Wing => NodeKind::Wing,
            SiteLevel::Floor => NodeKind::Floor,
            SiteLevel::Datacenter => NodeKind::Datacenter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct HierarchyNode {
    pub id: Uuid,
    pub kind: NodeKind,
    pub name: String,
    pub children: Vec<HierarchyNode>,
}

/// Builds the forest rooted at locations. Siblings are sorted by name,
/// case-insensitively; racks hang under their datacenter.
pub fn build_hierarchy(sites: &[Site], racks: &[Rack]) -> Vec<HierarchyNode> {
    let mut children: HashMap<Option<Uuid>, Vec<&Site>> = HashMap::new();
    for site in sites {
        children.entry(site.parent_id).or_default().push(site);
    }
    let mut racks_by_dc: HashMap<Uuid, Vec<&Rack>> = HashMap::new();
    for rack in racks {
        racks_by_dc.entry(rack.datacenter_id).or_default().push(rack);
    }

    build_level(None, &children, &racks_by_dc)
}

fn build_level(
    parent: Option<Uuid>,
    children: &HashMap<Option<Uuid>, Vec<&Site>>,
    racks_by_dc: &HashMap<Uuid, Vec<&Rack>>,
) -> Vec<HierarchyNode> {
    let mut nodes: Vec<HierarchyNode> = children
        .get(&parent)
        .map(|sites| {
            sites
                .iter()
                .map(|site| {
                    let mut node = HierarchyNode {
                        id: site.id,
                        kind: site.level.into(),
                        name: site.name.clone(),
                        children: build_level(Some(site.id), children, racks_by_dc),
                    };
                    if site.level == SiteLevel::Datacenter {
                        node.children.extend(racks_by_dc.get(&site.id).into_iter().flatten().map(
                            |rack| HierarchyNode {
                                id: rack.id,
                                kind: NodeKind::Rack,
                                name: rack.name.clone(),
                                children: Vec::new(),
                            },
                        ));
                        sort_by_name(&mut node.children);
                    }
                    node
                })
                .collect()
        })
        .unwrap_or_default();
    sort_by_name(&mut nodes);
    nodes
}

fn sort_by_name(nodes: &mut [HierarchyNode]) {
    nodes.sort_by_key(|n| n.name.to_lowercase());
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::models::rack::RackStatus;

    use super::*;

    fn site(level: SiteLevel, name: &str, parent_id: Option<Uuid>) -> Site {
        Site {
            id: Uuid::new_v4(),
            level,
            name: name.to_string(),
            parent_id,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rack(name: &str, datacenter_id: Uuid) -> Rack {
        Rack {
            id: Uuid::new_v4(),
            name: name.to_string(),
            datacenter_id,
            status: RackStatus::Active,
            width: None,
            height: 42,
            space_used: 0,
            space_available: 42,
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_tree_follows_levels_down_to_racks() {
        let loc = site(SiteLevel::Location, "Pune", None);
        let building = site(SiteLevel::Building, "B1", Some(loc.id));
        let wing = site(SiteLevel::Wing, "East", Some(building.id));
        let floor = site(SiteLevel::Floor, "F2", Some(wing.id));
        let dc = site(SiteLevel::Datacenter, "DC-A", Some(floor.id));
        let racks = vec![rack("R-02", dc.id), rack("r-01", dc.id)];
        let sites = vec![dc.clone(), floor, wing, building, loc];

        let tree = build_hierarchy(&sites, &racks);
        assert_eq!(tree.len(), 1);

        let mut node = &tree[0];
        for kind in [NodeKind::Location, NodeKind::Building, NodeKind::Wing, NodeKind::Floor] {
            assert_eq!(node.kind, kind);
            assert_eq!(node.children.len(), 1);
            node = &node.children[0];
        }
        assert_eq!(node.id, dc.id);
        let rack_names: Vec<&str> = node.children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(rack_names, vec!["r-01", "R-02"]);
        assert!(node.children.iter().all(|n| n.kind == NodeKind::Rack));
    }

    #[test]
    fn test_roots_sorted_by_name() {
        let sites = vec![
            site(SiteLevel::Location, "mumbai", None),
            site(SiteLevel::Location, "Chennai", None),
            site(SiteLevel::Location, "Bangalore", None),
        ];
        let names: Vec<String> = build_hierarchy(&sites, &[])
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["Bangalore", "Chennai", "mumbai"]);
    }

    #[test]
    fn test_empty_inventory() {
        assert!(build_hierarchy(&[], &[]).is_empty());
    }
}
