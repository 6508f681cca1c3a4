// ============================================================================
// spark-tracked - Scope Blocks
// Ownership tree, block execution, effects, and disposal
// ============================================================================
//
// Every computation with side effects is a block. Blocks form a tree:
// - root: detached, runs once, untracked; the usual owner of everything
// - render: tracked, runs on creation and re-runs inline during a flush
// - effect: tracked, scheduled on creation, runs after the render pass
// - branch: untracked, runs on creation, survives re-runs of its parent
//
// Links: parent -> first_child and sibling -> next are strong, every
// back-link is Weak. A block re-run first disposes its non-branch children
// (they are re-created by the run) and runs its previous teardown.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{AnyReaction, BlockFn, CleanupFn, Dependency};
use crate::reactivity::scheduling::schedule_update;
use crate::reactivity::tracking::{install_dependencies, is_dirty, remove_reactions, ComputationScope};

// =============================================================================
// BLOCK INNER
// =============================================================================

/// A node of the ownership tree.
pub struct BlockInner {
    flags: Cell<u32>,

    /// The block function. Taken out while it runs.
    func: RefCell<Option<BlockFn>>,

    /// Cleanup returned by the last run
    teardown: RefCell<Option<CleanupFn>>,

    /// Callbacks registered with `on_teardown`, run once on disposal
    cleanups: RefCell<Vec<CleanupFn>>,

    /// What the last run read
    deps: RefCell<Vec<Dependency>>,

    // =========================================================================
    // Tree links
    // =========================================================================
    parent: RefCell<Option<Weak<BlockInner>>>,
    first_child: RefCell<Option<Rc<BlockInner>>>,
    last_child: RefCell<Option<Weak<BlockInner>>>,
    prev_sibling: RefCell<Option<Weak<BlockInner>>>,
    next_sibling: RefCell<Option<Rc<BlockInner>>>,

    self_weak: Weak<BlockInner>,
}

impl BlockInner {
    fn new(kind: u32, func: Option<BlockFn>) -> Rc<Self> {
        Rc::new_cyclic(|self_weak| Self {
            flags: Cell::new(kind),
            func: RefCell::new(func),
            teardown: RefCell::new(None),
            cleanups: RefCell::new(Vec::new()),
            deps: RefCell::new(Vec::new()),
            parent: RefCell::new(None),
            first_child: RefCell::new(None),
            last_child: RefCell::new(None),
            prev_sibling: RefCell::new(None),
            next_sibling: RefCell::new(None),
            self_weak: self_weak.clone(),
        })
    }

    pub fn flags(&self) -> u32 {
        self.flags.get()
    }

    pub fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    pub fn parent(&self) -> Option<Rc<BlockInner>> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn first_child(&self) -> Option<Rc<BlockInner>> {
        self.first_child.borrow().clone()
    }

    pub fn next_sibling(&self) -> Option<Rc<BlockInner>> {
        self.next_sibling.borrow().clone()
    }

    fn children(&self) -> Vec<Rc<BlockInner>> {
        let mut out = Vec::new();
        let mut child = self.first_child();
        while let Some(c) = child {
            child = c.next_sibling();
            out.push(c);
        }
        out
    }

    fn as_reaction(self: &Rc<Self>) -> Rc<dyn AnyReaction> {
        self.clone()
    }
}

impl Drop for BlockInner {
    fn drop(&mut self) {
        // A block dropped without dispose (a detached effect whose handle
        // went away) still runs what it owes.
        if self.flags.get() & DESTROYED == 0 {
            for cleanup in self.cleanups.get_mut().drain(..).rev() {
                cleanup();
            }
            if let Some(teardown) = self.teardown.get_mut().take() {
                teardown();
            }
        }
    }
}

// =============================================================================
// AnyReaction IMPLEMENTATION
// =============================================================================

impl AnyReaction for BlockInner {
    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    fn schedule(&self) {
        if self.flags.get() & DESTROYED != 0 {
            return;
        }
        if let Some(this) = self.self_weak.upgrade() {
            schedule_update(&this);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// TREE LINKS
// =============================================================================

/// Append `block` as the last child of `parent`.
fn push_block(block: &Rc<BlockInner>, parent: &Rc<BlockInner>) {
    *block.parent.borrow_mut() = Some(Rc::downgrade(parent));

    let last = parent.last_child.borrow().as_ref().and_then(Weak::upgrade);
    match last {
        Some(last) => {
            *last.next_sibling.borrow_mut() = Some(block.clone());
            *block.prev_sibling.borrow_mut() = Some(Rc::downgrade(&last));
        }
        None => {
            *parent.first_child.borrow_mut() = Some(block.clone());
        }
    }
    *parent.last_child.borrow_mut() = Some(Rc::downgrade(block));
}

/// Remove `block` from its parent's child list.
fn unlink_block(block: &Rc<BlockInner>) {
    let prev = block.prev_sibling.borrow().as_ref().and_then(Weak::upgrade);
    let next = block.next_sibling.borrow().clone();

    if let Some(ref prev) = prev {
        *prev.next_sibling.borrow_mut() = next.clone();
    }
    if let Some(ref next) = next {
        *next.prev_sibling.borrow_mut() = prev.as_ref().map(Rc::downgrade);
    }

    if let Some(parent) = block.parent() {
        let is_first = parent
            .first_child
            .borrow()
            .as_ref()
            .is_some_and(|first| Rc::ptr_eq(first, block));
        if is_first {
            *parent.first_child.borrow_mut() = next.clone();
        }

        let is_last = parent
            .last_child
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|last| Rc::ptr_eq(&last, block));
        if is_last {
            *parent.last_child.borrow_mut() = prev.as_ref().map(Rc::downgrade);
        }
    }

    *block.prev_sibling.borrow_mut() = None;
    *block.next_sibling.borrow_mut() = None;
    *block.parent.borrow_mut() = None;
}

// =============================================================================
// TEARDOWN
// =============================================================================

/// Run `f` detached from any block, untracked.
fn run_detached(f: impl FnOnce()) {
    let scope = ComputationScope::enter(Some(None), false);
    f();
    scope.finish();
}

/// Run a block's teardown from its previous run
fn execute_teardown(block: &BlockInner) {
    let teardown = block.teardown.borrow_mut().take();
    if let Some(cleanup) = teardown {
        run_detached(cleanup);
    }
}

// =============================================================================
// DESTROY
// =============================================================================

/// Dispose the children a re-run will re-create. Branches stay.
fn destroy_non_branch_children(block: &Rc<BlockInner>) {
    for child in block.children().into_iter().rev() {
        if child.flags() & BRANCH_BLOCK == 0 {
            destroy_block(&child);
        }
    }
}

/// Dispose `block` and everything it owns, exactly once.
///
/// Children go first, last-created first; then `on_teardown` callbacks in
/// reverse registration order; then the block's own teardown. Every
/// dependency edge is severed and the block leaves its parent's list.
pub fn destroy_block(block: &Rc<BlockInner>) {
    let flags = block.flags();
    if flags & DESTROYED != 0 {
        return;
    }
    block.set_flags((flags | DESTROYED) & !CONTAINS_UPDATE);

    destroy_children(block);

    let cleanups = std::mem::take(&mut *block.cleanups.borrow_mut());
    for cleanup in cleanups.into_iter().rev() {
        run_detached(cleanup);
    }
    execute_teardown(block);

    let deps = std::mem::take(&mut *block.deps.borrow_mut());
    remove_reactions(&block.as_reaction(), &deps);

    unlink_block(block);
    *block.func.borrow_mut() = None;

    tracing::trace!(kind = ?BlockKind::from_flags(flags), "block disposed");
}

// =============================================================================
// RUN
// =============================================================================

/// Whether a block must run on this flush.
pub fn is_block_dirty(block: &Rc<BlockInner>) -> bool {
    let flags = block.flags();
    if flags & DESTROYED != 0 {
        return false;
    }
    if flags & BLOCK_HAS_RUN == 0 {
        return true;
    }
    if flags & (ROOT_BLOCK | BRANCH_BLOCK) != 0 {
        return false;
    }
    let deps = block.deps.borrow().clone();
    is_dirty(&deps)
}

/// Puts the function back after a run, including a panicking one.
struct FuncSlot<'a> {
    block: &'a BlockInner,
    func: Option<BlockFn>,
}

impl Drop for FuncSlot<'_> {
    fn drop(&mut self) {
        if self.block.flags() & DESTROYED == 0 {
            *self.block.func.borrow_mut() = self.func.take();
        }
    }
}

/// Execute a block: dispose what the previous run created, run the
/// function with `block` active, keep the new teardown and dependencies.
pub fn run_block(block: &Rc<BlockInner>) {
    let flags = block.flags();
    if flags & DESTROYED != 0 {
        return;
    }

    destroy_non_branch_children(block);
    execute_teardown(block);

    let Some(func) = block.func.borrow_mut().take() else {
        return;
    };
    let mut slot = FuncSlot {
        block,
        func: Some(func),
    };

    let tracking = flags & (ROOT_BLOCK | BRANCH_BLOCK) == 0;
    let scope = ComputationScope::enter(Some(Some(block.clone())), tracking);
    let teardown = match slot.func.as_mut() {
        Some(f) => f(),
        None => None,
    };
    let deps = scope.finish();
    drop(slot);

    block.set_flags(block.flags() | BLOCK_HAS_RUN);

    if block.flags() & DESTROYED != 0 {
        // Disposed from inside its own run: nobody will call this later
        if let Some(cleanup) = teardown {
            run_detached(cleanup);
        }
        return;
    }

    *block.teardown.borrow_mut() = teardown;

    let old = std::mem::replace(&mut *block.deps.borrow_mut(), deps.clone());
    install_dependencies(&block.as_reaction(), &old, &deps);
}

/// Block new children attach to: the ambient scope installed by
/// `with_scope`, else the running block.
fn current_parent() -> Option<Rc<BlockInner>> {
    with_context(|ctx| ctx.get_active_scope().or_else(|| ctx.get_active_block()))
}

/// A root with no function, for code running outside any block.
pub(crate) fn ambient_root() -> Rc<BlockInner> {
    BlockInner::new(ROOT_BLOCK | BLOCK_HAS_RUN, None)
}

/// A function-less branch under `owner` holding the blocks a derived
/// creates while computing. Being a branch, it outlives re-runs of `owner`.
pub(crate) fn computation_block(owner: Option<Rc<BlockInner>>) -> Rc<BlockInner> {
    let block = BlockInner::new(BRANCH_BLOCK | BLOCK_HAS_RUN, None);
    if let Some(owner) = owner {
        if owner.flags() & DESTROYED == 0 {
            push_block(&block, &owner);
        }
    }
    block
}

/// Dispose every child of `block`, last-created first. `block` stays.
pub(crate) fn destroy_children(block: &Rc<BlockInner>) {
    for child in block.children().into_iter().rev() {
        destroy_block(&child);
    }
}

fn create_block(kind: u32, func: BlockFn, parent: Option<Rc<BlockInner>>) -> Rc<BlockInner> {
    let block = BlockInner::new(kind, Some(func));
    if let Some(parent) = parent {
        if parent.flags() & DESTROYED == 0 {
            push_block(&block, &parent);
        }
    }
    block
}

// =============================================================================
// BLOCK - Public handle
// =============================================================================

/// Kind of a block, as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Root,
    Render,
    Effect,
    Branch,
}

impl BlockKind {
    fn from_flags(flags: u32) -> Option<Self> {
        match flags & BLOCK_KIND_MASK {
            ROOT_BLOCK => Some(Self::Root),
            RENDER_BLOCK => Some(Self::Render),
            EFFECT_BLOCK => Some(Self::Effect),
            BRANCH_BLOCK => Some(Self::Branch),
            _ => None,
        }
    }
}

/// Handle to a node of the ownership tree.
///
/// Cloning the handle does not clone the block. Dropping every handle of a
/// block that still has a parent leaves it alive (the parent owns it);
/// detached blocks live as long as a handle does.
///
/// # Example
///
/// ```
/// use spark_tracked::{effect_with_cleanup, flush_sync, root};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let cleaned = Rc::new(Cell::new(false));
/// let c = cleaned.clone();
///
/// let tree = root(move || {
///     let c = c.clone();
///     effect_with_cleanup(move || {
///         let c = c.clone();
///         Some(Box::new(move || c.set(true)))
///     });
/// });
/// flush_sync();
///
/// tree.dispose();
/// assert!(cleaned.get());
/// assert!(tree.is_destroyed());
/// ```
#[derive(Clone)]
pub struct Block {
    inner: Rc<BlockInner>,
}

impl Block {
    pub(crate) fn from_inner(inner: Rc<BlockInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Rc<BlockInner> {
        &self.inner
    }

    pub(crate) fn downgrade_inner(&self) -> Weak<BlockInner> {
        Rc::downgrade(&self.inner)
    }

    /// Dispose this block and everything it owns. Idempotent.
    pub fn dispose(&self) {
        destroy_block(&self.inner);
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.flags() & DESTROYED != 0
    }

    /// Skip this subtree in flushes until [`resume`](Self::resume).
    pub fn pause(&self) {
        let flags = self.inner.flags();
        self.inner.set_flags(flags | PAUSED);
    }

    /// Re-enable a paused subtree and catch up on missed updates.
    pub fn resume(&self) {
        let flags = self.inner.flags();
        if flags & PAUSED == 0 || flags & DESTROYED != 0 {
            return;
        }
        self.inner.set_flags(flags & !PAUSED);
        schedule_update(&self.inner);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.flags() & PAUSED != 0
    }

    /// Register a callback to run once when this block is disposed.
    ///
    /// Runs immediately if the block is already disposed.
    pub fn on_teardown(&self, f: impl FnOnce() + 'static) {
        if self.is_destroyed() {
            run_detached(f);
            return;
        }
        self.inner.cleanups.borrow_mut().push(Box::new(f));
    }

    pub fn kind(&self) -> Option<BlockKind> {
        BlockKind::from_flags(self.inner.flags())
    }

    pub fn parent(&self) -> Option<Block> {
        self.inner.parent().map(Block::from_inner)
    }

    /// Children in creation order
    pub fn children(&self) -> Vec<Block> {
        self.inner.children().into_iter().map(Block::from_inner).collect()
    }

    /// Whether both handles refer to the same block
    pub fn ptr_eq(&self, other: &Block) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Block {}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("kind", &self.kind())
            .field("destroyed", &self.is_destroyed())
            .field("paused", &self.is_paused())
            .finish()
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Create a detached root block and run `f` inside it, untracked.
///
/// Blocks and cells created by `f` are owned by the root; disposing the root
/// disposes all of them.
pub fn root(f: impl FnOnce() + 'static) -> Block {
    let mut f = Some(f);
    let block = create_block(
        ROOT_BLOCK,
        Box::new(move || {
            if let Some(f) = f.take() {
                f();
            }
            None
        }),
        None,
    );
    run_block(&block);
    Block::from_inner(block)
}

/// Create an effect that re-runs whenever what it read changes.
///
/// The effect does not run inline: it is scheduled, and runs at the next
/// `flush_sync()` or `tick()`, after the render blocks of its tree.
///
/// It attaches to the ambient scope, else to the running block; with
/// neither it is its own root and lives as long as the returned handle.
///
/// # Example
///
/// ```
/// use spark_tracked::{effect, flush_sync, root, Tracked};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let name = Tracked::new("a");
///
/// let (n, l) = (name.clone(), log.clone());
/// let _tree = root(move || {
///     effect(move || l.borrow_mut().push(n.get()));
/// });
///
/// flush_sync();
/// name.set("b");
/// flush_sync();
/// assert_eq!(*log.borrow(), vec!["a", "b"]);
/// ```
pub fn effect(mut f: impl FnMut() + 'static) -> Block {
    effect_with_cleanup(move || {
        f();
        None
    })
}

/// Create an effect whose function may return a cleanup.
///
/// The cleanup runs before the next run and when the effect is disposed.
pub fn effect_with_cleanup(f: impl FnMut() -> Option<CleanupFn> + 'static) -> Block {
    let block = create_block(EFFECT_BLOCK, Box::new(f), current_parent());
    schedule_update(&block);
    Block::from_inner(block)
}

/// Create a render block: runs now, re-runs inline during flushes.
pub fn render(mut f: impl FnMut() + 'static) -> Block {
    render_with_cleanup(move || {
        f();
        None
    })
}

/// [`render`] with a cleanup
pub fn render_with_cleanup(f: impl FnMut() -> Option<CleanupFn> + 'static) -> Block {
    let block = create_block(RENDER_BLOCK, Box::new(f), current_parent());
    run_block(&block);
    Block::from_inner(block)
}

/// Create a branch: runs now, untracked, and is kept when its parent
/// re-runs.
pub fn branch(f: impl FnOnce() + 'static) -> Block {
    let mut f = Some(f);
    let block = create_block(
        BRANCH_BLOCK,
        Box::new(move || {
            if let Some(f) = f.take() {
                f();
            }
            None
        }),
        current_parent(),
    );
    run_block(&block);
    Block::from_inner(block)
}

/// Whether code is running inside a block that records dependencies.
pub fn effect_tracking() -> bool {
    with_context(|ctx| ctx.is_tracking() && ctx.get_active_block().is_some())
}

/// The block whose function is running right now, if any.
pub fn active_block() -> Option<Block> {
    with_context(|ctx| ctx.get_active_block()).map(Block::from_inner)
}

// =============================================================================
// TESTS
// =============================================================================
