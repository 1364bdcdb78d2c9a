//! Core models for the sprig library
//!
//! This module contains the task tree data types and the pure operations
//! that turn one tree snapshot into the next. Every operation takes the
//! current snapshot by reference and returns a fresh `Tree`; callers that
//! keep the old snapshot around can continue to read it unchanged.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::TreeStore;

/// Stable task identifier, unique across the whole tree.
pub type TaskId = Uuid;

/// Errors produced by tree operations.
///
/// The first three map directly onto user intents that cannot be applied;
/// `DuplicateId` is a data-integrity violation that should only ever come
/// out of [`Tree::verify`] on loaded data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("task label is blank")]
    InvalidInput,

    #[error("no task with id {0}")]
    NotFound(TaskId),

    #[error("cannot move task {task} under {destination}: destination is inside its own subtree")]
    Cycle { task: TaskId, destination: TaskId },

    #[error("duplicate task id {0}")]
    DuplicateId(TaskId),
}

/// A single task node: a label, completion state, an optional markdown
/// document, and an ordered list of child tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    #[serde(rename = "task")]
    label: String,
    completed: bool,
    #[serde(rename = "completedAt")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    document: String,
    #[serde(default)]
    children: Vec<Task>,
}

impl Task {
    /// Creates a new incomplete task with a fresh id and no children.
    ///
    /// The label is stored verbatim but must not be blank after trimming.
    pub fn new(label: &str) -> Result<Self, TreeError> {
        if label.trim().is_empty() {
            return Err(TreeError::InvalidInput);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            label: label.to_string(),
            completed: false,
            completed_at: None,
            document: String::new(),
            children: Vec::new(),
        })
    }

    /// Gets the task id
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Gets the task label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Checks if this task is completed
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Gets the completion timestamp, present only while completed
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Gets the attached markdown document (empty when none)
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Gets the child tasks in display order
    pub fn children(&self) -> &[Task] {
        &self.children
    }

    /// Checks whether `id` names this task or any task in its subtree.
    fn subtree_contains(&self, id: TaskId) -> bool {
        self.id == id || self.children.iter().any(|child| child.subtree_contains(id))
    }
}

/// One immutable snapshot of the whole task forest.
///
/// Serializes transparently as an ordered list of root tasks, which is the
/// exact shape the persistence slot stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree {
    roots: Vec<Task>,
}

impl Tree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the root tasks in display order
    pub fn roots(&self) -> &[Task] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Counts every task in the tree, not just the roots.
    pub fn len(&self) -> usize {
        fn count(tasks: &[Task]) -> usize {
            tasks.iter().map(|t| 1 + count(t.children())).sum()
        }
        count(&self.roots)
    }

    /// Finds the task with the given id, visiting depth-first in pre-order
    /// (a task before its children, children in sibling order).
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        find(&self.roots, id)
    }

    /// Checks whether any task in the tree has the given id.
    pub fn contains(&self, id: TaskId) -> bool {
        self.get(id).is_some()
    }

    /// Appends a new root task at the end of the root sequence.
    pub fn insert_root(&self, label: &str) -> Result<Tree, TreeError> {
        let task = Task::new(label)?;
        let mut roots = self.roots.clone();
        roots.push(task);
        Ok(Tree { roots })
    }

    /// Appends a new child task under the task with `parent_id`.
    pub fn insert_child(&self, parent_id: TaskId, label: &str) -> Result<Tree, TreeError> {
        let task = Task::new(label)?;
        let mut roots = self.roots.clone();
        let parent = find_mut(&mut roots, parent_id).ok_or(TreeError::NotFound(parent_id))?;
        parent.children.push(task);
        Ok(Tree { roots })
    }

    /// Flips the completion state of the task with the given id, stamping
    /// `completed_at` with the current time on false→true and clearing it
    /// on true→false. Children and parents are left untouched.
    pub fn toggle_completion(&self, id: TaskId) -> Result<Tree, TreeError> {
        self.toggle_completion_at(id, Utc::now())
    }

    /// Same as [`Tree::toggle_completion`] with an explicit clock, so tests
    /// can assert on the stored timestamp.
    pub fn toggle_completion_at(&self, id: TaskId, now: DateTime<Utc>) -> Result<Tree, TreeError> {
        let mut roots = self.roots.clone();
        let task = find_mut(&mut roots, id).ok_or(TreeError::NotFound(id))?;
        task.completed = !task.completed;
        task.completed_at = if task.completed { Some(now) } else { None };
        Ok(Tree { roots })
    }

    /// Replaces the markdown document of the task with the given id.
    /// An empty string clears it.
    pub fn set_document(&self, id: TaskId, text: &str) -> Result<Tree, TreeError> {
        let mut roots = self.roots.clone();
        let task = find_mut(&mut roots, id).ok_or(TreeError::NotFound(id))?;
        task.document = text.to_string();
        Ok(Tree { roots })
    }

    /// Removes the task with the given id along with its entire subtree.
    ///
    /// A missing id is a reported failure, not a silent success, so callers
    /// can tell "deleted" apart from "nothing happened".
    pub fn remove(&self, id: TaskId) -> Result<Tree, TreeError> {
        let mut roots = self.roots.clone();
        detach(&mut roots, id).ok_or(TreeError::NotFound(id))?;
        Ok(Tree { roots })
    }

    /// Relocates the task with `id` (subtree intact) under `new_parent`,
    /// or to the root sequence when `new_parent` is `None`.
    ///
    /// `position` is clamped to the destination's child count as computed
    /// *after* the task has been detached, which is what drag-and-drop
    /// within the same parent expects. Moving a task into its own subtree
    /// is rejected before anything is relocated.
    pub fn move_task(
        &self,
        id: TaskId,
        new_parent: Option<TaskId>,
        position: usize,
    ) -> Result<Tree, TreeError> {
        let node = self.get(id).ok_or(TreeError::NotFound(id))?;

        // Ancestry check first: the destination must exist and must not be
        // the moved task or anything below it.
        if let Some(parent_id) = new_parent {
            if parent_id == id || node.subtree_contains(parent_id) {
                return Err(TreeError::Cycle {
                    task: id,
                    destination: parent_id,
                });
            }
            if !self.contains(parent_id) {
                return Err(TreeError::NotFound(parent_id));
            }
        }

        let mut roots = self.roots.clone();
        let detached = detach(&mut roots, id).ok_or(TreeError::NotFound(id))?;

        match new_parent {
            None => {
                let at = position.min(roots.len());
                roots.insert(at, detached);
            }
            Some(parent_id) => {
                let parent =
                    find_mut(&mut roots, parent_id).ok_or(TreeError::NotFound(parent_id))?;
                let at = position.min(parent.children.len());
                parent.children.insert(at, detached);
            }
        }

        Ok(Tree { roots })
    }

    /// Produces the display projection of the tree: tasks survive when they
    /// are incomplete or `show_completed` is set, applied recursively. A
    /// hidden parent hides its whole subtree, incomplete children included.
    ///
    /// This is a view-time projection; it must never be handed to the store.
    pub fn visible(&self, show_completed: bool) -> Tree {
        fn project(tasks: &[Task], show_completed: bool) -> Vec<Task> {
            tasks
                .iter()
                .filter(|task| !task.completed || show_completed)
                .map(|task| Task {
                    children: project(&task.children, show_completed),
                    ..task.clone()
                })
                .collect()
        }
        Tree {
            roots: project(&self.roots, show_completed),
        }
    }

    /// Scans the whole tree for duplicate ids.
    ///
    /// Pre-order lookups would silently pick the first match, so loaded
    /// data is checked explicitly and a duplicate is reported as the
    /// integrity violation it is.
    pub fn verify(&self) -> Result<(), TreeError> {
        fn scan(tasks: &[Task], seen: &mut HashSet<TaskId>) -> Result<(), TreeError> {
            for task in tasks {
                if !seen.insert(task.id) {
                    return Err(TreeError::DuplicateId(task.id));
                }
                scan(&task.children, seen)?;
            }
            Ok(())
        }
        scan(&self.roots, &mut HashSet::new())
    }
}

/// Pre-order depth-first lookup over a sibling sequence.
fn find(tasks: &[Task], id: TaskId) -> Option<&Task> {
    for task in tasks {
        if task.id == id {
            return Some(task);
        }
        if let Some(found) = find(&task.children, id) {
            return Some(found);
        }
    }
    None
}

/// Mutable counterpart of [`find`], used on cloned snapshots only.
fn find_mut(tasks: &mut [Task], id: TaskId) -> Option<&mut Task> {
    for task in tasks {
        if task.id == id {
            return Some(task);
        }
        if let Some(found) = find_mut(&mut task.children, id) {
            return Some(found);
        }
    }
    None
}

/// Removes the task with the given id from wherever it sits, returning it
/// with its subtree intact.
fn detach(tasks: &mut Vec<Task>, id: TaskId) -> Option<Task> {
    if let Some(at) = tasks.iter().position(|task| task.id == id) {
        return Some(tasks.remove(at));
    }
    for task in tasks {
        if let Some(found) = detach(&mut task.children, id) {
            return Some(found);
        }
    }
    None
}

/// Shared handle over the current snapshot.
///
/// `Core` serializes user intents: each call locks the snapshot, applies
/// exactly one pure tree operation, swaps in the result on success and
/// leaves the snapshot untouched on error. The new snapshot is written
/// through the store best-effort and subscribers are notified.
#[derive(Clone)]
pub struct Core {
    inner: Arc<Mutex<Tree>>,
    store: Arc<dyn TreeStore>,
    update_tx: Arc<tokio::sync::broadcast::Sender<()>>,
}

impl Core {
    /// Creates a core over an explicit starting snapshot.
    pub fn new(tree: Tree, store: Arc<dyn TreeStore>) -> Self {
        // Create a broadcast channel with capacity for 100 messages
        let (tx, _rx) = tokio::sync::broadcast::channel(100);

        Self {
            inner: Arc::new(Mutex::new(tree)),
            store,
            update_tx: Arc::new(tx),
        }
    }

    /// Creates a core seeded from whatever the store currently holds.
    pub fn load(store: Arc<dyn TreeStore>) -> Self {
        let tree = store.load();
        Self::new(tree, store)
    }

    // Helper method to apply one pure operation to the current snapshot,
    // persist the result, and notify observers about the state change.
    fn apply<F>(&self, op: F) -> Result<Tree, TreeError>
    where
        F: FnOnce(&Tree) -> Result<Tree, TreeError>,
    {
        let mut tree = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let next = op(&tree)?;
        *tree = next.clone();
        drop(tree);

        // The in-memory snapshot is authoritative; a failed write only
        // costs durability, never the running session.
        if let Err(e) = self.store.save(&next) {
            tracing::warn!("failed to persist snapshot: {e}");
        }
        let _ = self.update_tx.send(());

        Ok(next)
    }

    /// Gets a clone of the current snapshot.
    pub fn tree(&self) -> Tree {
        let tree = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tree.clone()
    }

    /// Gets the display projection of the current snapshot.
    pub fn visible(&self, show_completed: bool) -> Tree {
        self.tree().visible(show_completed)
    }

    /// Adds a root task, returning the new snapshot and the new task's id.
    pub fn add_root(&self, label: &str) -> Result<(Tree, TaskId), TreeError> {
        let next = self.apply(|tree| tree.insert_root(label))?;
        // insert_root appends, so the new task is the last root
        let id = next
            .roots()
            .last()
            .map(Task::id)
            .ok_or(TreeError::InvalidInput)?;
        Ok((next, id))
    }

    /// Adds a child task under `parent_id`, returning the new snapshot and
    /// the new task's id.
    pub fn add_child(&self, parent_id: TaskId, label: &str) -> Result<(Tree, TaskId), TreeError> {
        let next = self.apply(|tree| tree.insert_child(parent_id, label))?;
        let id = next
            .get(parent_id)
            .and_then(|parent| parent.children().last())
            .map(Task::id)
            .ok_or(TreeError::NotFound(parent_id))?;
        Ok((next, id))
    }

    /// Toggles completion of the task with the given id.
    pub fn toggle(&self, id: TaskId) -> Result<Tree, TreeError> {
        self.apply(|tree| tree.toggle_completion(id))
    }

    /// Replaces the document attached to the task with the given id.
    pub fn set_document(&self, id: TaskId, text: &str) -> Result<Tree, TreeError> {
        self.apply(|tree| tree.set_document(id, text))
    }

    /// Removes the task with the given id and its subtree.
    pub fn remove(&self, id: TaskId) -> Result<Tree, TreeError> {
        self.apply(|tree| tree.remove(id))
    }

    /// Reparents or reorders the task with the given id.
    pub fn move_task(
        &self,
        id: TaskId,
        new_parent: Option<TaskId>,
        position: usize,
    ) -> Result<Tree, TreeError> {
        self.apply(|tree| tree.move_task(id, new_parent, position))
    }

    // Subscribe to state updates
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.update_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn tree_with(labels: &[&str]) -> Tree {
        labels
            .iter()
            .fold(Tree::new(), |tree, label| tree.insert_root(label).unwrap())
    }

    #[test]
    fn insert_root_appends_in_order() {
        let tree = tree_with(&["Buy milk", "Walk dog"]);

        let labels: Vec<_> = tree.roots().iter().map(Task::label).collect();
        assert_eq!(labels, vec!["Buy milk", "Walk dog"]);
        assert!(tree.roots().iter().all(|t| !t.is_completed()));
        assert!(tree.roots().iter().all(|t| t.completed_at().is_none()));
    }

    #[test]
    fn insert_rejects_blank_labels() {
        let tree = Tree::new();
        assert_eq!(tree.insert_root("").unwrap_err(), TreeError::InvalidInput);
        assert_eq!(
            tree.insert_root("   \t").unwrap_err(),
            TreeError::InvalidInput
        );

        let tree = tree_with(&["parent"]);
        let parent_id = tree.roots()[0].id();
        assert_eq!(
            tree.insert_child(parent_id, "  ").unwrap_err(),
            TreeError::InvalidInput
        );
    }

    #[test]
    fn insert_child_nests_under_parent() {
        let tree = tree_with(&["Buy milk"]);
        let root_id = tree.roots()[0].id();

        let tree = tree.insert_child(root_id, "2% milk").unwrap();

        assert_eq!(tree.roots().len(), 1);
        let root = &tree.roots()[0];
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].label(), "2% milk");
        assert!(!root.is_completed());
        assert!(!root.children()[0].is_completed());
    }

    #[test]
    fn insert_child_preserves_sibling_order() {
        let tree = tree_with(&["parent"]);
        let parent_id = tree.roots()[0].id();

        let tree = tree
            .insert_child(parent_id, "C1")
            .unwrap()
            .insert_child(parent_id, "C2")
            .unwrap();

        let labels: Vec<_> = tree.roots()[0]
            .children()
            .iter()
            .map(Task::label)
            .collect();
        assert_eq!(labels, vec!["C1", "C2"]);
    }

    #[test]
    fn insert_child_missing_parent_is_not_found() {
        let tree = tree_with(&["a"]);
        let ghost = Uuid::new_v4();
        assert_eq!(
            tree.insert_child(ghost, "b").unwrap_err(),
            TreeError::NotFound(ghost)
        );
    }

    #[test]
    fn ids_are_unique_across_the_tree() {
        let tree = tree_with(&["a", "b", "c"]);
        let parent_id = tree.roots()[0].id();
        let tree = tree
            .insert_child(parent_id, "a1")
            .unwrap()
            .insert_child(parent_id, "a2")
            .unwrap();

        assert_eq!(tree.len(), 5);
        tree.verify().unwrap();
    }

    #[test]
    fn toggle_stamps_and_clears_completed_at() {
        let tree = tree_with(&["task"]);
        let id = tree.roots()[0].id();
        let now = Utc::now();

        let done = tree.toggle_completion_at(id, now).unwrap();
        assert!(done.roots()[0].is_completed());
        assert_eq!(done.roots()[0].completed_at(), Some(now));

        let undone = done.toggle_completion_at(id, Utc::now()).unwrap();
        assert!(!undone.roots()[0].is_completed());
        assert_eq!(undone.roots()[0].completed_at(), None);
    }

    #[test]
    fn double_toggle_restores_original_state() {
        let tree = tree_with(&["task"]);
        let id = tree.roots()[0].id();

        let twice = tree
            .toggle_completion(id)
            .unwrap()
            .toggle_completion(id)
            .unwrap();

        assert_eq!(twice, tree);
    }

    #[test]
    fn toggle_does_not_cascade() {
        let tree = tree_with(&["parent"]);
        let parent_id = tree.roots()[0].id();
        let tree = tree.insert_child(parent_id, "child").unwrap();
        let child_id = tree.roots()[0].children()[0].id();

        // Completing the parent leaves the child alone
        let tree = tree.toggle_completion(parent_id).unwrap();
        assert!(tree.roots()[0].is_completed());
        assert!(!tree.roots()[0].children()[0].is_completed());

        // Completing the child leaves the (completed) parent alone
        let tree = tree.toggle_completion(child_id).unwrap();
        assert!(tree.roots()[0].is_completed());
        assert!(tree.roots()[0].children()[0].is_completed());
    }

    #[test]
    fn toggle_missing_id_is_not_found() {
        let tree = tree_with(&["task"]);
        let ghost = Uuid::new_v4();
        assert_eq!(
            tree.toggle_completion(ghost).unwrap_err(),
            TreeError::NotFound(ghost)
        );
    }

    #[test]
    fn operations_leave_the_input_snapshot_unchanged() {
        let before = tree_with(&["task"]);
        let id = before.roots()[0].id();

        let _after = before.toggle_completion(id).unwrap();
        assert!(!before.roots()[0].is_completed());

        let _after = before.remove(id).unwrap();
        assert_eq!(before.roots().len(), 1);
    }

    #[test]
    fn remove_deletes_the_whole_subtree() {
        let tree = tree_with(&["keep", "drop"]);
        let drop_id = tree.roots()[1].id();
        let tree = tree.insert_child(drop_id, "drop-child").unwrap();
        let child_id = tree.roots()[1].children()[0].id();
        let tree = tree.insert_child(child_id, "drop-grandchild").unwrap();
        let grandchild_id = tree.roots()[1].children()[0].children()[0].id();

        let tree = tree.remove(drop_id).unwrap();

        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.roots()[0].label(), "keep");
        for id in [drop_id, child_id, grandchild_id] {
            assert!(!tree.contains(id));
        }
    }

    #[test]
    fn remove_missing_id_is_not_found() {
        let tree = tree_with(&["task"]);
        let ghost = Uuid::new_v4();
        assert_eq!(tree.remove(ghost).unwrap_err(), TreeError::NotFound(ghost));
    }

    #[test]
    fn move_reparents_with_subtree_intact() {
        // C holds B (which holds a grandchild); A is a sibling of C.
        let tree = tree_with(&["A", "C"]);
        let a_id = tree.roots()[0].id();
        let c_id = tree.roots()[1].id();
        let tree = tree.insert_child(c_id, "B").unwrap();
        let b_id = tree.roots()[1].children()[0].id();
        let tree = tree.insert_child(b_id, "B-child").unwrap();

        let tree = tree.move_task(b_id, Some(a_id), 0).unwrap();

        let a = tree.get(a_id).unwrap();
        assert_eq!(a.children().len(), 1);
        assert_eq!(a.children()[0].id(), b_id);
        assert_eq!(a.children()[0].children()[0].label(), "B-child");
        assert!(tree.get(c_id).unwrap().children().is_empty());
        tree.verify().unwrap();
    }

    #[test]
    fn move_to_root_level() {
        let tree = tree_with(&["parent"]);
        let parent_id = tree.roots()[0].id();
        let tree = tree.insert_child(parent_id, "child").unwrap();
        let child_id = tree.roots()[0].children()[0].id();

        let tree = tree.move_task(child_id, None, 0).unwrap();

        assert_eq!(tree.roots().len(), 2);
        assert_eq!(tree.roots()[0].id(), child_id);
        assert!(tree.roots()[1].children().is_empty());
    }

    #[test]
    fn move_into_own_subtree_is_a_cycle() {
        let tree = tree_with(&["top"]);
        let top_id = tree.roots()[0].id();
        let tree = tree.insert_child(top_id, "mid").unwrap();
        let mid_id = tree.roots()[0].children()[0].id();
        let tree = tree.insert_child(mid_id, "leaf").unwrap();
        let leaf_id = tree.roots()[0].children()[0].children()[0].id();

        // Onto itself, onto a direct child, onto a deeper descendant
        for destination in [top_id, mid_id, leaf_id] {
            let result = tree.move_task(top_id, Some(destination), 0);
            assert_eq!(
                result.unwrap_err(),
                TreeError::Cycle {
                    task: top_id,
                    destination
                }
            );
        }
    }

    #[test]
    fn rejected_move_leaves_the_tree_unchanged() {
        let tree = tree_with(&["top"]);
        let top_id = tree.roots()[0].id();
        let tree = tree.insert_child(top_id, "mid").unwrap();
        let mid_id = tree.roots()[0].children()[0].id();

        let before = tree.clone();
        assert!(tree.move_task(top_id, Some(mid_id), 0).is_err());
        assert_eq!(tree, before);
    }

    #[test]
    fn move_missing_ids_are_not_found() {
        let tree = tree_with(&["a"]);
        let a_id = tree.roots()[0].id();
        let ghost = Uuid::new_v4();

        assert_eq!(
            tree.move_task(ghost, Some(a_id), 0).unwrap_err(),
            TreeError::NotFound(ghost)
        );
        assert_eq!(
            tree.move_task(a_id, Some(ghost), 0).unwrap_err(),
            TreeError::NotFound(ghost)
        );
    }

    #[test]
    fn move_clamps_position_to_destination_length() {
        let tree = tree_with(&["a", "b", "c"]);
        let a_id = tree.roots()[0].id();

        // Far past the end still lands at the end of the post-removal
        // sequence (b, c).
        let tree = tree.move_task(a_id, None, 99).unwrap();
        let labels: Vec<_> = tree.roots().iter().map(Task::label).collect();
        assert_eq!(labels, vec!["b", "c", "a"]);
    }

    #[test]
    fn move_within_same_parent_reorders_against_post_removal_sequence() {
        let tree = tree_with(&["a", "b", "c"]);
        let c_id = tree.roots()[2].id();

        let tree = tree.move_task(c_id, None, 1).unwrap();

        let labels: Vec<_> = tree.roots().iter().map(Task::label).collect();
        assert_eq!(labels, vec!["a", "c", "b"]);
    }

    #[test]
    fn visible_hides_completed_tasks() {
        // Root A incomplete, child B complete
        let tree = tree_with(&["A"]);
        let a_id = tree.roots()[0].id();
        let tree = tree.insert_child(a_id, "B").unwrap();
        let b_id = tree.roots()[0].children()[0].id();
        let tree = tree.toggle_completion(b_id).unwrap();

        let hidden = tree.visible(false);
        assert_eq!(hidden.roots().len(), 1);
        assert_eq!(hidden.roots()[0].label(), "A");
        assert!(hidden.roots()[0].children().is_empty());

        let shown = tree.visible(true);
        assert_eq!(shown.roots()[0].children().len(), 1);
    }

    #[test]
    fn visible_hides_incomplete_children_of_completed_parents() {
        let tree = tree_with(&["parent"]);
        let parent_id = tree.roots()[0].id();
        let tree = tree.insert_child(parent_id, "child").unwrap();
        let tree = tree.toggle_completion(parent_id).unwrap();

        let projected = tree.visible(false);
        assert!(projected.is_empty());
    }

    #[test]
    fn set_document_round_trips_and_clears() {
        let tree = tree_with(&["task"]);
        let id = tree.roots()[0].id();

        let tree = tree.set_document(id, "# notes\n\nsome *markdown*").unwrap();
        assert_eq!(
            tree.get(id).unwrap().document(),
            "# notes\n\nsome *markdown*"
        );

        let tree = tree.set_document(id, "").unwrap();
        assert_eq!(tree.get(id).unwrap().document(), "");
    }

    #[test]
    fn verify_reports_duplicate_ids() {
        let tree = tree_with(&["a"]);
        tree.verify().unwrap();

        // Forge a duplicate through the serialized form, the only way one
        // could appear in practice.
        let id = tree.roots()[0].id();
        let forged = format!(
            r#"[{{"id":"{id}","task":"a","completed":false,"completedAt":null}},
                {{"id":"{id}","task":"b","completed":false,"completedAt":null}}]"#
        );
        let forged: Tree = serde_json::from_str(&forged).unwrap();
        assert_eq!(forged.verify().unwrap_err(), TreeError::DuplicateId(id));
    }

    #[test]
    fn core_applies_ops_and_keeps_snapshot_on_error() {
        let core = Core::new(Tree::new(), Arc::new(MemoryStore::new()));

        let (_, root_id) = core.add_root("Buy milk").unwrap();
        let (tree, child_id) = core.add_child(root_id, "2% milk").unwrap();
        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.roots()[0].children()[0].id(), child_id);

        // A failed intent leaves the current snapshot untouched
        let before = core.tree();
        assert!(core.remove(Uuid::new_v4()).is_err());
        assert_eq!(core.tree(), before);
    }

    #[test]
    fn core_persists_each_successful_mutation() {
        let store = Arc::new(MemoryStore::new());
        let core = Core::new(Tree::new(), store.clone());

        let (_, id) = core.add_root("task").unwrap();
        core.toggle(id).unwrap();

        let reloaded = store.load();
        assert_eq!(reloaded, core.tree());
        assert!(reloaded.roots()[0].is_completed());
    }

    #[test]
    fn core_notifies_subscribers_on_change() {
        let core = Core::new(Tree::new(), Arc::new(MemoryStore::new()));
        let mut rx = core.subscribe();

        core.add_root("task").unwrap();
        assert!(rx.try_recv().is_ok());
    }
}
