use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::State;
use crate::time::Timestamp;
use crate::vector::PositionVector;

/// A tracked space (root topic) or subspace (child of a root topic).
///
/// `evidence` is only meaningful together with `last_updated_at`: decay is
/// applied lazily the next time the topic is visited.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub user_id: String,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub evidence: f64,
    pub last_updated_at: Timestamp,
    pub position: PositionVector,
}

impl Topic {
    pub fn new(user_id: &str, name: &str, parent_id: Option<Uuid>, now: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            parent_id,
            name: name.to_string(),
            evidence: 0.0,
            last_updated_at: now,
            position: PositionVector::default(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// State implied by stored evidence, without decaying it first.
    pub fn stored_state(&self) -> State {
        State::classify(self.evidence)
    }
}

/// A root topic together with its direct children.
#[derive(Clone, Debug)]
pub struct TopicTree {
    pub root: Topic,
    pub children: Vec<Topic>,
}

impl TopicTree {
    /// Group a flat topic list into trees. Children whose parent is missing
    /// from the list are ignored; roots keep their input order.
    pub fn from_topics(topics: Vec<Topic>) -> Vec<TopicTree> {
        let (roots, children): (Vec<Topic>, Vec<Topic>) =
            topics.into_iter().partition(Topic::is_root);

        let mut trees: Vec<TopicTree> = roots
            .into_iter()
            .map(|root| TopicTree {
                root,
                children: Vec::new(),
            })
            .collect();

        for child in children {
            if let Some(tree) = trees
                .iter_mut()
                .find(|t| Some(t.root.id) == child.parent_id)
            {
                tree.children.push(child);
            }
        }
        trees
    }
}
