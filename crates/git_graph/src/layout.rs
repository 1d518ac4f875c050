use crate::allocator::ColumnAllocator;
use serde::{Serialize, Serializer};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Number of parent edges tracked per commit. Octopus merges keep only their
/// first two parents; further parents are dropped from the graph.
pub const TRACKED_PARENTS: usize = 2;

/// A commit's link to one parent, as resolved within the current window.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParentRef {
    /// No parent in this slot.
    None,
    /// The parent exists but is not among the commits resolved so far
    /// (history truncated by a count limit or filter). It may resolve on a
    /// later pass once more history is fetched.
    OutsideWindow,
    /// Window index of the parent.
    Index(usize),
}

impl ParentRef {
    pub fn index(self) -> Option<usize> {
        match self {
            ParentRef::Index(index) => Some(index),
            _ => None,
        }
    }
}

/// Wire form: `-1` for no parent, `-2` for a parent outside the window,
/// otherwise the parent's window index.
impl Serialize for ParentRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ParentRef::None => serializer.serialize_i64(-1),
            ParentRef::OutsideWindow => serializer.serialize_i64(-2),
            ParentRef::Index(index) => serializer.serialize_i64(*index as i64),
        }
    }
}

/// One commit row in the layout window.
#[derive(Debug)]
pub struct Commit {
    pub id: String,
    parent_ids: SmallVec<[String; TRACKED_PARENTS]>,
    lane: Option<usize>,
    pub parents: [ParentRef; TRACKED_PARENTS],
    pub min_reserved_lane: usize,
    pub max_reserved_lane: usize,
}

impl Commit {
    fn new(id: String, parent_ids: SmallVec<[String; TRACKED_PARENTS]>) -> Self {
        Self {
            id,
            parent_ids,
            lane: None,
            parents: [ParentRef::None; TRACKED_PARENTS],
            min_reserved_lane: 0,
            max_reserved_lane: 0,
        }
    }

    /// The lane assigned by the most recent layout pass.
    pub fn lane(&self) -> usize {
        self.lane.unwrap_or(0)
    }
}

/// Assigns lanes and reservation ranges to an ordered window of commits.
///
/// The whole window is re-laid-out from scratch every time a batch of commits
/// is appended, so lane values of earlier commits may change as later history
/// arrives; the output is always consistent with the full window known so
/// far. One instance per request; no state survives across requests.
#[derive(Debug, Default)]
pub struct GraphLayout {
    commits: Vec<Commit>,
    index_by_id: HashMap<String, usize>,
    allocator: ColumnAllocator,
}

impl GraphLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// Appends a commit to the window. Parents beyond [`TRACKED_PARENTS`]
    /// are dropped.
    pub fn push(&mut self, id: String, parent_ids: impl IntoIterator<Item = String>) {
        let parent_ids = parent_ids.into_iter().take(TRACKED_PARENTS).collect();
        self.index_by_id.insert(id.clone(), self.commits.len());
        self.commits.push(Commit::new(id, parent_ids));
    }

    /// Recomputes lanes and reservation ranges for the entire window.
    ///
    /// Idempotent: re-running over an unchanged window yields identical
    /// output. Total over any input shape; an unresolvable parent becomes
    /// [`ParentRef::OutsideWindow`], never an error.
    pub fn layout(&mut self) {
        self.assign_lanes();
        self.shrink_reservations();
    }

    /// Scan 1: walk the window in order, continuing each commit's lane
    /// through its primary line of descent and branching merge parents onto
    /// fresh lanes.
    fn assign_lanes(&mut self) {
        self.allocator.reset();
        for commit in &mut self.commits {
            commit.lane = None;
            commit.parents = [ParentRef::None; TRACKED_PARENTS];
            commit.min_reserved_lane = 0;
            commit.max_reserved_lane = 0;
        }

        for index in 0..self.commits.len() {
            let lane = match self.commits[index].lane {
                Some(lane) => lane,
                None => {
                    let lane = self.allocator.acquire();
                    self.commits[index].lane = Some(lane);
                    lane
                }
            };

            for slot in 0..TRACKED_PARENTS {
                let Some(parent_id) = self.commits[index].parent_ids.get(slot) else {
                    break;
                };
                let Some(&parent_index) = self.index_by_id.get(parent_id.as_str()) else {
                    self.commits[index].parents[slot] = ParentRef::OutsideWindow;
                    continue;
                };
                if self.commits[parent_index].lane.is_none() {
                    // The primary line of descent continues straight down:
                    // the parent inherits this commit's lane unless the
                    // first-slot parent already occupies it, in which case a
                    // merge's second parent branches onto a fresh lane.
                    let continues = match self.commits[index].parents[0] {
                        ParentRef::Index(first) => self.commits[first].lane != Some(lane),
                        _ => true,
                    };
                    self.commits[parent_index].lane = Some(if continues {
                        lane
                    } else {
                        self.allocator.acquire()
                    });
                }
                self.commits[index].parents[slot] = ParentRef::Index(parent_index);
            }

            // Provisional reservation: the instantaneous lane frontier.
            // Refined by the shrink pass below.
            self.commits[index].max_reserved_lane = self.allocator.frontier().saturating_sub(1);

            if !self.lane_continues(index, lane) {
                self.allocator.release(lane);
            }
        }
    }

    /// A commit is a lane terminus when neither tracked parent carries its
    /// lane onward (roots, and merges whose parents both diverge).
    fn lane_continues(&self, index: usize, lane: usize) -> bool {
        self.commits[index].parents.iter().any(|parent| match parent {
            ParentRef::Index(parent_index) => self.commits[*parent_index].lane == Some(lane),
            _ => false,
        })
    }

    /// Scan 2: shrink each commit's reserved interval past lanes no commit
    /// further down the window still owns, so the renderer only blocks
    /// horizontal space for lanes genuinely crossing that row.
    fn shrink_reservations(&mut self) {
        let mut last_owner = vec![0; self.allocator.high_water()];
        for (index, commit) in self.commits.iter().enumerate() {
            if let Some(lane) = commit.lane {
                last_owner[lane] = index;
            }
        }

        for (index, commit) in self.commits.iter_mut().enumerate() {
            let Some(lane) = commit.lane else { continue };
            while commit.min_reserved_lane < lane && last_owner[commit.min_reserved_lane] < index {
                commit.min_reserved_lane += 1;
            }
            while commit.max_reserved_lane > lane && last_owner[commit.max_reserved_lane] < index {
                commit.max_reserved_lane -= 1;
            }
        }
    }
}
