//! Module for the parser state.
//!
//! The state owns the token cursor and the context tree for a single parse
//! attempt. Grammar readers drive it through a small set of operations:
//! open a context, read tokens, and either end the context (sealing an Ast
//! node) or delete it (collapsing into its lone child). Lookahead callers
//! bracket their reads with [`fast_state_backup`][ParserState::fast_state_backup]
//! and [`apply_backup`][ParserState::apply_backup].

use crate::Span;
use crate::error::ParseError;
use crate::error::ParseErrorKind;
use crate::error::ParseErrorState;
use crate::lexer::TokenKind;
use crate::lexer::TokenSnapshot;
use crate::locale::ParseSettings;
use crate::node::AstNode;
use crate::node::ContextNode;
use crate::node::NodeId;
use crate::node::TokenRange;
use crate::node_map::NodeIdMap;
use crate::syntax::NodeKind;

/// A captured point in a parse that the state can be rewound to.
///
/// Restoring prunes every node issued after the capture and truncates the
/// child lists they appeared in; ids are monotonic, so a single id threshold
/// identifies everything to discard.
#[derive(Debug, Clone, Copy)]
pub struct StateBackup {
    /// The token cursor at capture.
    token_index: usize,
    /// The next id that would have been issued at capture.
    next_id: u32,
    /// The current context at capture.
    maybe_current_context: Option<NodeId>,
    /// The current context's attribute counter at capture.
    ///
    /// Lookahead reads children into the current context; restoring the
    /// counter keeps its slot numbering stable.
    current_attribute_counter: usize,
    /// The root at capture.
    maybe_root: Option<NodeId>,
}

/// Mutable state for a single parse attempt.
///
/// A state is exclusively owned by one invocation; the immutable artifacts
/// it publishes on success may then be shared freely.
#[derive(Debug)]
pub struct ParserState<'a> {
    /// The token snapshot being parsed.
    snapshot: &'a TokenSnapshot<'a>,
    /// The index of the next token to read.
    token_index: usize,
    /// The kind of the token at the cursor, denormalized for hot reads.
    maybe_current_kind: Option<TokenKind>,
    /// The node-id map being built.
    node_map: NodeIdMap,
    /// The next node id to issue.
    next_id: u32,
    /// The root context, set by the first `start_context`.
    maybe_root: Option<NodeId>,
    /// The currently open context.
    maybe_current_context: Option<NodeId>,
    /// The parse settings.
    settings: ParseSettings,
}

impl<'a> ParserState<'a> {
    /// Creates a new state over the given snapshot.
    pub fn new(settings: ParseSettings, snapshot: &'a TokenSnapshot<'a>) -> Self {
        Self {
            snapshot,
            token_index: 0,
            maybe_current_kind: snapshot.get(0).map(|t| t.kind),
            node_map: NodeIdMap::new(),
            next_id: 1,
            maybe_root: None,
            maybe_current_context: None,
            settings,
        }
    }

    /// Gets the snapshot being parsed.
    pub fn snapshot(&self) -> &'a TokenSnapshot<'a> {
        self.snapshot
    }

    /// Gets the parse settings.
    pub fn settings(&self) -> ParseSettings {
        self.settings
    }

    /// Gets the index of the next token to read.
    pub fn token_index(&self) -> usize {
        self.token_index
    }

    /// Gets the kind of the token at the cursor.
    pub fn maybe_current_kind(&self) -> Option<TokenKind> {
        self.maybe_current_kind
    }

    /// Determines if the cursor is on a token of the given kind.
    pub fn is_on(&self, kind: TokenKind) -> bool {
        self.maybe_current_kind == Some(kind)
    }

    /// Determines if the cursor is on any token of the given kinds.
    pub fn is_on_any(&self, kinds: &[TokenKind]) -> bool {
        self.maybe_current_kind.is_some_and(|k| kinds.contains(&k))
    }

    /// Gets the kind of the token at the given absolute index.
    pub fn kind_at(&self, index: usize) -> Option<TokenKind> {
        self.snapshot.get(index).map(|t| t.kind)
    }

    /// Gets the raw text of the token at the cursor.
    pub fn current_text(&self) -> Option<&'a str> {
        self.snapshot.text_at(self.token_index)
    }

    /// Gets the node-id map built so far.
    pub fn node_map(&self) -> &NodeIdMap {
        &self.node_map
    }

    /// Gets the currently open context.
    pub fn maybe_current_context(&self) -> Option<NodeId> {
        self.maybe_current_context
    }

    // ---- context tree -----------------------------------------------------

    /// Opens a new context of the given kind as a child of the current
    /// context, and makes it current.
    pub fn start_context(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;

        let attribute_index = self
            .maybe_current_context
            .map(|parent| self.node_map.bump_attribute_counter(parent));

        self.node_map.insert_context(
            ContextNode {
                id,
                kind,
                attribute_index,
                attribute_counter: 0,
                token_start: self.token_index,
            },
            self.maybe_current_context,
        );

        if self.maybe_root.is_none() {
            self.maybe_root = Some(id);
        }

        self.maybe_current_context = Some(id);
        id
    }

    /// Closes the current context, promoting it to an interior Ast node.
    ///
    /// The node's token range is sealed from the context's tentative start
    /// to the cursor. The parent context becomes current again.
    ///
    /// # Panics
    ///
    /// Panics if no context is open, or if the context's kind is a leaf kind.
    pub fn end_context(&mut self) -> NodeId {
        self.end(None)
    }

    /// Closes the current context, promoting it to a leaf Ast node carrying
    /// the given literal.
    ///
    /// # Panics
    ///
    /// Panics if no context is open, or if the context's kind is not a leaf
    /// kind.
    pub fn end_leaf(&mut self, literal: String) -> NodeId {
        self.end(Some(literal))
    }

    /// Promotes the current context with the given optional literal.
    fn end(&mut self, literal: Option<String>) -> NodeId {
        let id = self.maybe_current_context.expect("a context should be open");
        let context = self
            .node_map
            .context_node(id)
            .expect("current context should be in the map")
            .clone();
        assert_eq!(
            context.kind.is_leaf(),
            literal.is_some(),
            "literal presence must match leaf-ness of {kind:?}",
            kind = context.kind
        );

        self.node_map.promote_context(AstNode {
            id,
            kind: context.kind,
            attribute_index: context.attribute_index,
            token_range: TokenRange::new(context.token_start, self.token_index),
            literal,
        });

        self.maybe_current_context = self.node_map.parent_of(id);
        id
    }

    /// Discards the current context, splicing its lone child (if any) into
    /// the context's slot in its parent.
    ///
    /// Used when a production decides to collapse into its single child,
    /// such as a metadata expression with no `meta` suffix.
    ///
    /// # Panics
    ///
    /// Panics if no context is open or the context has more than one child.
    pub fn delete_context(&mut self) {
        let id = self.maybe_current_context.expect("a context should be open");
        self.maybe_current_context = self.node_map.parent_of(id);
        if self.maybe_root == Some(id) {
            self.maybe_root = self.node_map.children_of(id).first().copied();
        }

        self.node_map.delete_context(id);
    }

    /// Advances the current context's next-slot counter without creating a
    /// child.
    ///
    /// Called when an optional grammar element is absent, to keep the slot
    /// indices of the following children stable.
    pub fn increment_attribute_counter(&mut self) {
        let id = self.maybe_current_context.expect("a context should be open");
        self.node_map.bump_attribute_counter(id);
    }

    /// Re-parents an already-finished head node under the current context.
    ///
    /// See [`NodeIdMap::reparent_under_context`] for the surgery this
    /// performs; the current context must have just been opened for the
    /// enclosing recursive primary expression.
    pub fn reparent_under_current_context(&mut self, head: NodeId) {
        let context = self.maybe_current_context.expect("a context should be open");
        self.node_map.reparent_under_context(head, context);
    }

    /// Moves the cursor to an absolute token index.
    ///
    /// This bypasses every reader invariant; callers must pair it with a
    /// backup/restore so no node observes the moved cursor.
    pub(crate) fn unsafe_move_to(&mut self, token_index: usize) {
        self.token_index = token_index;
        self.maybe_current_kind = self.snapshot.get(token_index).map(|t| t.kind);
    }

    // ---- backup / restore -------------------------------------------------

    /// Captures the state for a later [`apply_backup`][Self::apply_backup].
    pub fn fast_state_backup(&self) -> StateBackup {
        StateBackup {
            token_index: self.token_index,
            next_id: self.next_id,
            maybe_current_context: self.maybe_current_context,
            current_attribute_counter: self
                .maybe_current_context
                .and_then(|id| self.node_map.context_node(id))
                .map(|c| c.attribute_counter)
                .unwrap_or(0),
            maybe_root: self.maybe_root,
        }
    }

    /// Rewinds the state to a captured backup.
    ///
    /// Every node issued since the capture is removed from the map and from
    /// the child lists it appeared in; the cursor and context bookkeeping
    /// are restored.
    pub fn apply_backup(&mut self, backup: StateBackup) {
        self.node_map.prune_from(NodeId::new(backup.next_id));
        self.next_id = backup.next_id;
        self.token_index = backup.token_index;
        self.maybe_current_kind = self.snapshot.get(backup.token_index).map(|t| t.kind);
        self.maybe_current_context = backup.maybe_current_context;
        self.maybe_root = backup.maybe_root;

        if let Some(id) = backup.maybe_current_context {
            self.node_map
                .set_attribute_counter(id, backup.current_attribute_counter);
        }
    }

    // ---- reader primitives ------------------------------------------------

    /// Reads the token at the cursor, advancing past it.
    ///
    /// # Panics
    ///
    /// Panics at end of input; readers must test the cursor first.
    pub fn read_token(&mut self) -> String {
        let text = self
            .current_text()
            .expect("read_token called at end of input");
        self.token_index += 1;
        self.maybe_current_kind = self.snapshot.get(self.token_index).map(|t| t.kind);
        text.to_string()
    }

    /// Reads the token at the cursor, requiring it to be of the given kind.
    pub fn read_token_kind(&mut self, kind: TokenKind) -> Result<String, ParseError> {
        if !self.is_on(kind) {
            return Err(self.error_expected(kind));
        }

        Ok(self.read_token())
    }

    /// Reads a token of the given kind as a single-token `Constant` node.
    pub fn read_token_kind_as_constant(&mut self, kind: TokenKind) -> Result<NodeId, ParseError> {
        if !self.is_on(kind) {
            return Err(self.error_expected(kind));
        }

        self.start_context(NodeKind::Constant);
        let literal = self.read_token();
        Ok(self.end_leaf(literal))
    }

    /// Reads a token of the given kind as a `Constant` node if present.
    ///
    /// When the cursor is not on the given kind, the attribute counter of
    /// the current context is advanced so the absent constant's slot stays
    /// reserved.
    pub fn maybe_read_token_kind_as_constant(&mut self, kind: TokenKind) -> Option<NodeId> {
        if self.is_on(kind) {
            Some(
                self.read_token_kind_as_constant(kind)
                    .expect("cursor kind was just checked"),
            )
        } else {
            self.increment_attribute_counter();
            None
        }
    }

    // ---- errors -----------------------------------------------------------

    /// Creates an error of the given kind at the cursor.
    pub fn error(&self, kind: ParseErrorKind) -> ParseError {
        self.error_at(kind, self.token_index)
    }

    /// Creates an error of the given kind at the given token index.
    pub fn error_at(&self, kind: ParseErrorKind, token_index: usize) -> ParseError {
        let span = self
            .snapshot
            .get(token_index)
            .map(|t| t.span)
            .unwrap_or_else(|| Span::new(self.snapshot.source().len(), 0));
        ParseError::new(kind, token_index, self.snapshot.position_start(token_index), span)
    }

    /// Creates an "expected token kind" error at the cursor.
    pub fn error_expected(&self, expected: TokenKind) -> ParseError {
        self.error(ParseErrorKind::ExpectedTokenKind {
            expected,
            found: self.maybe_current_kind,
        })
    }

    /// Creates an "expected any token kind" error at the cursor.
    pub fn error_expected_any(&self, expected: &'static [TokenKind]) -> ParseError {
        self.error(ParseErrorKind::ExpectedAnyTokenKind {
            expected,
            found: self.maybe_current_kind,
        })
    }

    /// Fails with `UnusedTokensRemain` if the cursor has not reached the end
    /// of the snapshot.
    pub fn expect_no_more_tokens(&self) -> Result<(), ParseError> {
        if self.token_index < self.snapshot.len() {
            return Err(self.error(ParseErrorKind::UnusedTokensRemain));
        }

        Ok(())
    }

    /// Consumes the state into the context tree at failure.
    pub fn into_error_state(self) -> ParseErrorState {
        ParseErrorState {
            node_map: self.node_map,
            maybe_root: self.maybe_root,
        }
    }

    /// Consumes the state into the finished node-id map.
    ///
    /// # Panics
    ///
    /// Panics if any context is still open.
    pub fn into_node_map(self) -> NodeIdMap {
        assert!(
            self.maybe_current_context.is_none(),
            "a context is still open"
        );
        self.node_map
    }
}
