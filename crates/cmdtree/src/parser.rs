//! The parser tree: declarative construction and read-only views.
//!
//! A [`Cmdline`] owns every parser node and item in two arenas. Nodes link to
//! their parent; a command item links to the child parser it activates. The
//! tree is built once by [`Cmdline::build`] and never changes shape.

use std::path::Path;

use crate::error::DefinitionError;
use crate::item::{
    Flag, GlobalMatch, ItemId, ItemKind, OnMatch, ParseItem, ParserId,
};
use crate::matches::Matches;
use crate::usage::{PlainUsage, RenderUsage};

pub(crate) struct ParserNode {
    parent: Option<ParserId>,
    command: Option<ItemId>,
    description: String,
    items: Vec<ItemId>,
    pub(crate) on_match: Option<OnMatch>,
}

impl ParserNode {
    fn new(parent: Option<ParserId>, command: Option<ItemId>, description: String) -> Self {
        Self {
            parent,
            command,
            description,
            items: Vec::new(),
            on_match: None,
        }
    }
}

/// A complete command-line grammar.
pub struct Cmdline {
    program: String,
    pub(crate) parsers: Vec<ParserNode>,
    pub(crate) items: Vec<ParseItem>,
    renderer: Box<dyn RenderUsage>,
}

impl Cmdline {
    /// Build the tree: `builder` configures the root parser and, through
    /// [`ParserBuilder::add_command`], every subparser.
    pub fn build<F>(description: impl Into<String>, builder: F) -> Result<Self, DefinitionError>
    where
        F: FnOnce(&mut ParserBuilder<'_>),
    {
        let mut cmdline = Self {
            program: default_program(),
            parsers: vec![ParserNode::new(None, None, description.into())],
            items: Vec::new(),
            renderer: Box::new(PlainUsage),
        };
        let mut defects = Vec::new();
        builder(&mut ParserBuilder {
            cmdline: &mut cmdline,
            id: ParserId::ROOT,
            defects: &mut defects,
        });

        match defects.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(cmdline),
        }
    }

    /// Program name shown on the usage line.
    pub fn with_program(mut self, name: impl Into<String>) -> Self {
        self.program = name.into();
        self
    }

    pub fn with_renderer(mut self, renderer: impl RenderUsage + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn root(&self) -> Parser<'_> {
        self.parser(ParserId::ROOT)
    }

    /// View of the parser `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not handed out by this `Cmdline`.
    pub fn parser(&self, id: ParserId) -> Parser<'_> {
        assert!(id.index() < self.parsers.len(), "unknown parser {}", id.index());
        Parser { cmdline: self, id }
    }

    /// # Panics
    ///
    /// Panics if `id` was not handed out by this `Cmdline`; see
    /// [`get_item`](Self::get_item) for the fallible lookup.
    pub fn item(&self, id: ItemId) -> &ParseItem {
        &self.items[id.index()]
    }

    pub fn get_item(&self, id: ItemId) -> Option<&ParseItem> {
        self.items.get(id.index())
    }

    pub fn items(&self) -> &[ParseItem] {
        &self.items
    }

    /// Usage text for one parser level, rendered by the configured renderer.
    pub fn usage(&self, id: ParserId) -> String {
        self.renderer.render_usage(self.parser(id))
    }

    pub(crate) fn node(&self, id: ParserId) -> &ParserNode {
        &self.parsers[id.index()]
    }
}

impl std::fmt::Debug for Cmdline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cmdline")
            .field("program", &self.program)
            .field("parsers", &self.parsers.len())
            .field("items", &self.items)
            .finish()
    }
}

fn default_program() -> String {
    std::env::args_os()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

/// Construction handle for one parser level.
pub struct ParserBuilder<'a> {
    cmdline: &'a mut Cmdline,
    id: ParserId,
    defects: &'a mut Vec<DefinitionError>,
}

impl ParserBuilder<'_> {
    pub fn id(&self) -> ParserId {
        self.id
    }

    fn push(&mut self, item: ParseItem) -> ItemId {
        let id = item.id;
        self.cmdline.items.push(item);
        self.cmdline.parsers[self.id.index()].items.push(id);
        id
    }

    fn next_item(&self, kind: ItemKind) -> ParseItem {
        ParseItem::new(ItemId(self.cmdline.items.len()), self.id, kind)
    }

    fn own_items(&self, kind: ItemKind) -> impl Iterator<Item = &ParseItem> + '_ {
        self.cmdline.parsers[self.id.index()]
            .items
            .iter()
            .map(|id| &self.cmdline.items[id.index()])
            .filter(move |item| item.kind == kind)
    }

    /// Add a command; `build` configures the subparser it activates.
    pub fn add_command<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        build: F,
    ) -> ItemId
    where
        F: FnOnce(&mut ParserBuilder<'_>),
    {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            self.defects.push(DefinitionError::EmptyCommandName);
        } else if self
            .own_items(ItemKind::Command)
            .any(|c| c.short_name() == Some(name.as_str()))
        {
            self.defects.push(DefinitionError::DuplicateCommand(name.clone()));
        }

        let child = ParserId(self.cmdline.parsers.len());
        let mut item = self.next_item(ItemKind::Command);
        item.short_name = Some(name);
        item.description = description.into();
        item.subparser = Some(child);
        let id = self.push(item);

        self.cmdline
            .parsers
            .push(ParserNode::new(Some(self.id), Some(id), String::new()));

        build(&mut ParserBuilder {
            cmdline: &mut *self.cmdline,
            id: child,
            defects: &mut *self.defects,
        });
        id
    }

    /// Add a flag.
    pub fn add_flag(&mut self, flag: Flag) -> ItemId {
        if flag.short.is_none() && flag.long.is_none() {
            self.defects.push(DefinitionError::UnnamedFlag {
                description: flag.description.clone(),
            });
        }
        let mut item = self.next_item(ItemKind::Flag);
        item.short_name = flag.short;
        item.long_name = flag.long;
        item.value_name = flag.value_name;
        item.description = flag.description;
        item.mandatory = flag.mandatory;
        self.push(item)
    }

    /// Add a global flag: it matches at this level and every level below it,
    /// regardless of missing commands, flags or parameters, and `action` runs
    /// in place of the normal match actions.
    pub fn add_global_flag<A>(&mut self, flag: Flag, action: A) -> ItemId
    where
        A: Fn(&Matches<'_>, GlobalMatch) -> anyhow::Result<()> + 'static,
    {
        let id = self.add_flag(flag);
        self.cmdline.items[id.index()].global = Some(Box::new(action));
        id
    }

    fn add_positional(&mut self, kind: ItemKind, name: String, description: String, mandatory: bool) -> ItemId {
        let existing_array = self
            .own_items(ItemKind::ParameterArray)
            .next()
            .map(ParseItem::display_name);
        if let (ItemKind::ParameterArray, Some(first)) = (kind, existing_array) {
            self.defects.push(DefinitionError::DuplicateParameterArray {
                first,
                second: name.clone(),
            });
        }
        let mut item = self.next_item(kind);
        item.short_name = Some(name);
        item.description = description;
        item.mandatory = mandatory;
        self.push(item)
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, description: impl Into<String>) -> ItemId {
        self.add_positional(ItemKind::Parameter, name.into(), description.into(), false)
    }

    pub fn add_mandatory_parameter(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> ItemId {
        self.add_positional(ItemKind::Parameter, name.into(), description.into(), true)
    }

    /// Add the trailing array taking every token left after flags, commands
    /// and parameters. At most one per parser.
    pub fn add_parameter_array(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> ItemId {
        self.add_positional(ItemKind::ParameterArray, name.into(), description.into(), false)
    }

    pub fn add_mandatory_parameter_array(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> ItemId {
        self.add_positional(ItemKind::ParameterArray, name.into(), description.into(), true)
    }

    /// Completion candidates for a parameter or parameter array.
    pub fn on_completion<C>(&mut self, item: ItemId, provider: C)
    where
        C: Fn(&str) -> Vec<String> + 'static,
    {
        if let Some(item) = self.cmdline.items.get_mut(item.index()) {
            item.completion = Some(Box::new(provider));
        }
    }

    /// Action deferred when this parser level matches.
    pub fn on_match<A>(&mut self, action: A)
    where
        A: Fn(&Matches<'_>) -> anyhow::Result<()> + 'static,
    {
        self.cmdline.parsers[self.id.index()].on_match = Some(Box::new(action));
    }
}

/// Read-only view of one parser level.
#[derive(Clone, Copy)]
pub struct Parser<'a> {
    cmdline: &'a Cmdline,
    id: ParserId,
}

impl<'a> Parser<'a> {
    pub fn id(self) -> ParserId {
        self.id
    }

    pub fn cmdline(self) -> &'a Cmdline {
        self.cmdline
    }

    pub fn program(self) -> &'a str {
        self.cmdline.program()
    }

    fn node(self) -> &'a ParserNode {
        self.cmdline.node(self.id)
    }

    pub fn parent(self) -> Option<Parser<'a>> {
        self.node().parent.map(|id| self.cmdline.parser(id))
    }

    pub fn is_root(self) -> bool {
        self.node().parent.is_none()
    }

    /// Topmost parser.
    pub fn root(self) -> Parser<'a> {
        self.cmdline.root()
    }

    /// Ancestors, root first, excluding this parser.
    pub fn ancestors(self) -> Vec<Parser<'a>> {
        let mut path = Vec::new();
        let mut cur = self.parent();
        while let Some(p) = cur {
            path.push(p);
            cur = p.parent();
        }
        path.reverse();
        path
    }

    /// Ancestors followed by this parser.
    pub fn path(self) -> Vec<Parser<'a>> {
        let mut path = self.ancestors();
        path.push(self);
        path
    }

    /// Program name followed by the commands leading to this parser.
    pub fn invocation(self) -> String {
        let mut out = self.program().to_string();
        for cmd in self.path().into_iter().filter_map(|p| p.command()) {
            out.push(' ');
            out.push_str(cmd.short_name().unwrap_or_default());
        }
        out
    }

    /// Command item that activates this parser (`None` for the root).
    pub fn command(self) -> Option<&'a ParseItem> {
        self.node().command.map(|id| self.cmdline.item(id))
    }

    /// Own description, or the activating command's.
    pub fn description(self) -> &'a str {
        let own = self.node().description.as_str();
        match self.command() {
            Some(cmd) if own.is_empty() => cmd.description(),
            _ => own,
        }
    }

    pub fn has_on_match(self) -> bool {
        self.node().on_match.is_some()
    }

    pub fn items(self) -> impl Iterator<Item = &'a ParseItem> {
        let cmdline = self.cmdline;
        self.node().items.iter().map(move |id| cmdline.item(*id))
    }

    fn items_of(self, kind: ItemKind) -> impl Iterator<Item = &'a ParseItem> {
        self.items().filter(move |item| item.kind() == kind)
    }

    pub fn commands(self) -> impl Iterator<Item = &'a ParseItem> {
        self.items_of(ItemKind::Command)
    }

    pub fn has_commands(self) -> bool {
        self.commands().next().is_some()
    }

    /// This parser's own flags.
    pub fn flags(self) -> impl Iterator<Item = &'a ParseItem> {
        self.items_of(ItemKind::Flag)
    }

    /// Flags declared by ancestors, root first.
    pub fn inherited_flags(self) -> impl Iterator<Item = &'a ParseItem> {
        self.ancestors().into_iter().flat_map(|p| p.flags())
    }

    /// Inherited flags followed by own flags: everything the flag phase may match.
    pub fn all_flags(self) -> impl Iterator<Item = &'a ParseItem> {
        self.inherited_flags().chain(self.flags())
    }

    pub fn global_flags(self) -> impl Iterator<Item = &'a ParseItem> {
        self.all_flags().filter(|f| f.is_global())
    }

    /// Items declared by ancestors, root first.
    pub fn inherited_items(self) -> impl Iterator<Item = &'a ParseItem> {
        self.ancestors().into_iter().flat_map(|p| p.items())
    }

    pub fn all_items(self) -> impl Iterator<Item = &'a ParseItem> {
        self.inherited_items().chain(self.items())
    }

    pub fn parameters(self) -> impl Iterator<Item = &'a ParseItem> {
        self.items_of(ItemKind::Parameter)
    }

    pub fn parameter_array(self) -> Option<&'a ParseItem> {
        self.items_of(ItemKind::ParameterArray).next()
    }

    /// Parameters followed by the parameter array, in matching order.
    pub fn positionals(self) -> impl Iterator<Item = &'a ParseItem> {
        self.parameters().chain(self.parameter_array())
    }
}

impl std::fmt::Debug for Parser<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("id", &self.id)
            .field("command", &self.command().and_then(|c| c.short_name()))
            .finish()
    }
}
