// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element arena: ownership, parent lookup, and display ordering.

use core::fmt;

use smallvec::SmallVec;

use crate::element::{Element, ElementId};
use crate::layout::LayoutKey;

/// Child ids in display order. Most containers have few children.
pub type OrderedChildren = SmallVec<[ElementId; 16]>;

/// Inclusive span of display order values among a set of siblings.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct OrderRange {
    /// Lowest display order.
    pub min: i32,
    /// Highest display order.
    pub max: i32,
}

impl OrderRange {
    /// Returns `true` when siblings use more than one distinct order value.
    pub fn is_mixed(self) -> bool {
        self.min != self.max
    }
}

#[derive(Clone, Debug)]
pub(crate) struct OrderCache {
    frame: u64,
    ids: OrderedChildren,
    range: OrderRange,
}

/// Receives a notification for each element destroyed by [`ElementTree::remove`].
///
/// The focus subsystem uses this to move focus away from elements that no longer exist.
pub trait FocusRelease {
    /// `element` is being destroyed and must not keep focus.
    fn release_focus(&mut self, element: ElementId);
}

impl FocusRelease for () {
    fn release_focus(&mut self, _element: ElementId) {}
}

impl FocusRelease for Vec<ElementId> {
    fn release_focus(&mut self, element: ElementId) {
        self.push(element);
    }
}

/// Errors from structural edits.
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The id does not refer to a live element.
    Stale(ElementId),
    /// The parent cannot hold children.
    NotAContainer(ElementId),
    /// The move would make an element its own ancestor.
    WouldCreateCycle {
        /// Element being moved.
        element: ElementId,
        /// Requested new parent.
        parent: ElementId,
    },
}

impl fmt::Debug for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale(id) => write!(f, "TreeError::Stale({id:?})"),
            Self::NotAContainer(id) => write!(f, "TreeError::NotAContainer({id:?})"),
            Self::WouldCreateCycle { element, parent } => write!(
                f,
                "TreeError::WouldCreateCycle {{ element: {element:?}, parent: {parent:?} }}"
            ),
        }
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale(id) => write!(f, "element {id:?} is not alive"),
            Self::NotAContainer(id) => write!(f, "element {id:?} cannot hold children"),
            Self::WouldCreateCycle { element, parent } => write!(
                f,
                "moving {element:?} under {parent:?} would make it its own ancestor"
            ),
        }
    }
}

impl core::error::Error for TreeError {}

#[derive(Debug)]
struct Slot {
    generation: u32,
    element: Option<Element>,
}

/// Arena of elements.
///
/// Parents own their children through the child list; the parent link on each element
/// is a plain id resolved through this arena.
#[derive(Debug, Default)]
pub struct ElementTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<ElementId>,
    next_sequence: u64,
}

impl ElementTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, mut element: Element) -> ElementId {
        element.sequence = self.next_sequence;
        self.next_sequence += 1;
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.element = Some(element);
            ElementId::new(idx, slot.generation)
        } else {
            let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 1,
                element: Some(element),
            });
            ElementId::new(idx, 1)
        }
    }

    /// Adds a top-level element.
    pub fn insert_root(&mut self, mut element: Element) -> ElementId {
        element.parent = None;
        let id = self.alloc(element);
        self.roots.push(id);
        id
    }

    /// Adds `element` as the last child of `parent`.
    pub fn insert(&mut self, parent: ElementId, mut element: Element) -> Result<ElementId, TreeError> {
        match self.get(parent) {
            None => return Err(TreeError::Stale(parent)),
            Some(p) if !p.is_container() => return Err(TreeError::NotAContainer(parent)),
            Some(_) => {}
        }
        element.parent = Some(parent);
        let id = self.alloc(element);
        self.attach(parent, id);
        Ok(id)
    }

    fn attach(&mut self, parent: ElementId, child: ElementId) {
        if let Some(p) = self.get_mut(parent) {
            if let Some(children) = p.children.as_mut() {
                children.push(child);
            }
            p.order_cache.get_mut().take();
        }
    }

    fn detach(&mut self, id: ElementId) {
        match self.get(id).and_then(Element::parent) {
            Some(parent) => {
                if let Some(p) = self.get_mut(parent) {
                    if let Some(children) = p.children.as_mut() {
                        children.retain(|c| *c != id);
                    }
                    p.order_cache.get_mut().take();
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
    }

    /// Removes `id` and its whole subtree.
    ///
    /// `focus` is notified once per destroyed element, deepest first.
    /// Returns `false` if `id` was not alive.
    pub fn remove(&mut self, id: ElementId, focus: &mut dyn FocusRelease) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.detach(id);
        let mut post_order = Vec::new();
        let mut stack = vec![(id, false)];
        while let Some((n, expanded)) = stack.pop() {
            if expanded {
                post_order.push(n);
                continue;
            }
            stack.push((n, true));
            if let Some(el) = self.get(n) {
                for &c in el.children().iter().rev() {
                    stack.push((c, false));
                }
            }
        }
        for n in post_order {
            focus.release_focus(n);
            let slot = &mut self.slots[n.idx()];
            slot.element = None;
            self.free.push(n.0);
        }
        true
    }

    /// Moves `id` to be the last child of `new_parent`.
    pub fn reparent(&mut self, id: ElementId, new_parent: ElementId) -> Result<(), TreeError> {
        if !self.is_alive(id) {
            return Err(TreeError::Stale(id));
        }
        match self.get(new_parent) {
            None => return Err(TreeError::Stale(new_parent)),
            Some(p) if !p.is_container() => return Err(TreeError::NotAContainer(new_parent)),
            Some(_) => {}
        }
        if new_parent == id || self.ancestors(new_parent).any(|a| a == id) {
            return Err(TreeError::WouldCreateCycle {
                element: id,
                parent: new_parent,
            });
        }
        self.detach(id);
        if let Some(el) = self.get_mut(id) {
            el.parent = Some(new_parent);
        }
        self.attach(new_parent, id);
        Ok(())
    }

    /// Returns `true` if `id` refers to a live element.
    pub fn is_alive(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    /// Borrows a live element.
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        let slot = self.slots.get(id.idx())?;
        if slot.generation != id.1 {
            return None;
        }
        slot.element.as_ref()
    }

    /// Mutably borrows a live element.
    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        let slot = self.slots.get_mut(id.idx())?;
        if slot.generation != id.1 {
            return None;
        }
        slot.element.as_mut()
    }

    /// Parent of a live element.
    pub fn parent_of(&self, id: ElementId) -> Option<ElementId> {
        self.get(id).and_then(Element::parent)
    }

    /// Children of a live element in insertion order.
    pub fn children_of(&self, id: ElementId) -> &[ElementId] {
        self.get(id).map(Element::children).unwrap_or(&[])
    }

    /// Top-level elements in insertion order.
    pub fn roots(&self) -> &[ElementId] {
        &self.roots
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        core::iter::successors(self.parent_of(id), move |p| self.parent_of(*p))
    }

    /// Number of ancestors of `id`.
    pub fn depth_of(&self, id: ElementId) -> usize {
        self.ancestors(id).count()
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Returns `true` if the tree has no live elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Changes the display order of `id` and invalidates its parent's cached ordering.
    pub fn set_display_order(&mut self, id: ElementId, order: i32) {
        let parent = match self.get_mut(id) {
            Some(el) => {
                el.display_order = order;
                el.parent
            }
            None => return,
        };
        if let Some(p) = parent.and_then(|p| self.get_mut(p)) {
            p.order_cache.get_mut().take();
        }
    }

    /// Marks `id` and its descendants as needing layout.
    pub fn invalidate_layout(&mut self, id: ElementId) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(el) = self.get_mut(n) {
                el.layout_key = LayoutKey::INVALID;
                stack.extend_from_slice(el.children());
            }
        }
    }

    fn sort_by_display_order(&self, ids: &[ElementId]) -> (OrderedChildren, OrderRange) {
        let mut keyed: SmallVec<[(i32, u64, ElementId); 16]> = ids
            .iter()
            .filter_map(|&id| self.get(id).map(|el| (el.display_order, el.sequence, id)))
            .collect();
        keyed.sort_unstable_by_key(|&(order, seq, _)| (order, seq));
        let range = OrderRange {
            min: keyed.first().map_or(0, |k| k.0),
            max: keyed.last().map_or(0, |k| k.0),
        };
        (keyed.into_iter().map(|(_, _, id)| id).collect(), range)
    }

    /// Children of `id` in display order, with insertion order breaking ties.
    ///
    /// The result is cached per `frame_index`; edits made through [`set_display_order`]
    /// and structural edits invalidate the cache immediately, direct field edits take
    /// effect on the next frame.
    ///
    /// [`set_display_order`]: Self::set_display_order
    pub fn children_in_display_order(
        &self,
        id: ElementId,
        frame_index: u64,
    ) -> (OrderedChildren, OrderRange) {
        let Some(el) = self.get(id) else {
            return (OrderedChildren::new(), OrderRange::default());
        };
        if let Some(cache) = el.order_cache.borrow().as_ref() {
            if cache.frame == frame_index {
                return (cache.ids.clone(), cache.range);
            }
        }
        let (ids, range) = self.sort_by_display_order(el.children());
        *el.order_cache.borrow_mut() = Some(OrderCache {
            frame: frame_index,
            ids: ids.clone(),
            range,
        });
        (ids, range)
    }

    /// Top-level elements in display order.
    pub fn roots_in_display_order(&self) -> (OrderedChildren, OrderRange) {
        self.sort_by_display_order(&self.roots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_children(orders: &[i32]) -> (ElementTree, ElementId, Vec<ElementId>) {
        let mut tree = ElementTree::new();
        let root = tree.insert_root(Element::container());
        let kids = orders
            .iter()
            .map(|&o| {
                tree.insert(root, Element::leaf().with_display_order(o))
                    .unwrap()
            })
            .collect();
        (tree, root, kids)
    }

    #[test]
    fn stale_ids_do_not_alias() {
        let mut tree = ElementTree::new();
        let a = tree.insert_root(Element::leaf());
        assert!(tree.remove(a, &mut ()));
        let b = tree.insert_root(Element::leaf());
        assert_eq!(a.index(), b.index());
        assert!(!tree.is_alive(a));
        assert!(tree.is_alive(b));
    }

    #[test]
    fn display_order_is_stable_on_ties() {
        let (tree, root, kids) = tree_with_children(&[1, 0, 1, 0]);
        let (order, range) = tree.children_in_display_order(root, 0);
        assert_eq!(order.as_slice(), &[kids[1], kids[3], kids[0], kids[2]]);
        assert_eq!(range, OrderRange { min: 0, max: 1 });
        assert!(range.is_mixed());
    }

    #[test]
    fn set_display_order_invalidates_cache() {
        let (mut tree, root, kids) = tree_with_children(&[0, 0]);
        let _ = tree.children_in_display_order(root, 7);
        tree.set_display_order(kids[0], 5);
        let (order, _) = tree.children_in_display_order(root, 7);
        assert_eq!(order.as_slice(), &[kids[1], kids[0]]);
    }

    #[test]
    fn remove_notifies_deepest_first() {
        let mut tree = ElementTree::new();
        let root = tree.insert_root(Element::container());
        let panel = tree.insert(root, Element::container()).unwrap();
        let button = tree.insert(panel, Element::leaf()).unwrap();
        let mut released: Vec<ElementId> = Vec::new();
        assert!(tree.remove(panel, &mut released));
        assert_eq!(released, [button, panel]);
        assert!(tree.children_of(root).is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn leaves_reject_children() {
        let mut tree = ElementTree::new();
        let leaf = tree.insert_root(Element::leaf());
        assert_eq!(
            tree.insert(leaf, Element::leaf()),
            Err(TreeError::NotAContainer(leaf))
        );
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut tree = ElementTree::new();
        let a = tree.insert_root(Element::container());
        let b = tree.insert(a, Element::container()).unwrap();
        assert_eq!(
            tree.reparent(a, b),
            Err(TreeError::WouldCreateCycle {
                element: a,
                parent: b
            })
        );
        let c = tree.insert_root(Element::container());
        tree.reparent(b, c).unwrap();
        assert_eq!(tree.parent_of(b), Some(c));
        assert!(tree.children_of(a).is_empty());
        assert_eq!(tree.depth_of(b), 1);
    }

    #[test]
    fn invalidate_layout_is_recursive() {
        let mut tree = ElementTree::new();
        let root = tree.insert_root(Element::container().with_layout(LayoutKey(0)));
        let kid = tree
            .insert(root, Element::leaf().with_layout(LayoutKey(1)))
            .unwrap();
        tree.invalidate_layout(root);
        assert!(!tree.get(kid).unwrap().layout_key.is_valid());
    }
}
