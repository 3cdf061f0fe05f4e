//! Directive processing for a single load
//!
//! A [`LoadSession`] walks the directive graph of a root document depth
//! first. Every document gets one entry per effective target namespace (a
//! chameleon document included into two namespaces is two entries). A
//! directive whose target is still loading, or is itself waiting on other
//! entries, is deferred onto the target and merged once the target drains.
//! Whatever is still deferred when the root finishes is a directive cycle and
//! is settled by merging around the cycle until nothing changes.

use std::collections::HashMap;
use std::mem;

use tracing::{debug, trace, warn};

use crate::error::{Error, ErrorKind, Result, SchemaError};
use crate::loaders::{read_document, DirectiveKind, ResolveRequest, ResolvedDocument, SchemaResolver};
use crate::validators::globals::ComponentKind;
use crate::validators::parsing::{parse_schema_document, Directive, ParsedDocument, Redefinitions};
use crate::validators::schemas::Schema;

use super::merge::{include_compatible, merge_schema, MergeMode};
use super::LoaderOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Unknown,
    Loading,
    Loaded,
}

/// A directive of `source` waiting for its target to drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingDirective {
    source: usize,
    directive: usize,
}

/// Global declarations spliced into an entry by one include or redefine
#[derive(Debug, Clone, Copy)]
struct Splice {
    directive: usize,
    position: usize,
    count: usize,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    source: usize,
    target: usize,
    directive: usize,
    /// Revision of the target when it was last merged along this edge
    merged_revision: usize,
}

#[derive(Debug)]
struct LoadEntry {
    system_id: String,
    effective_namespace: String,
    state: LoadState,
    schema: Schema,
    directives: Vec<Directive>,
    /// Directives of other entries waiting on this one
    pending: Vec<PendingDirective>,
    /// Directives of this entry still waiting on other entries
    pending_count: usize,
    splices: Vec<Splice>,
    /// Bumped whenever a merge adds components to the schema
    revision: usize,
}

impl LoadEntry {
    /// Insertion index for the globals of an include written at `position`,
    /// shifted by everything spliced in ahead of it
    fn splice_position(&self, directive: usize, position: usize) -> usize {
        position
            + self
                .splices
                .iter()
                .filter(|s| s.position < position || (s.position == position && s.directive < directive))
                .map(|s| s.count)
                .sum::<usize>()
    }
}

/// State of one `load` call
pub(crate) struct LoadSession<'a> {
    resolver: &'a dyn SchemaResolver,
    options: &'a LoaderOptions,
    entries: Vec<LoadEntry>,
    index: HashMap<(String, String), usize>,
    documents: HashMap<String, ParsedDocument>,
    edges: Vec<Edge>,
    /// Merges performed so far
    merges: usize,
}

impl<'a> LoadSession<'a> {
    pub(crate) fn new(resolver: &'a dyn SchemaResolver, options: &'a LoaderOptions) -> Self {
        Self {
            resolver,
            options,
            entries: Vec::new(),
            index: HashMap::new(),
            documents: HashMap::new(),
            edges: Vec::new(),
            merges: 0,
        }
    }

    /// Load `location` and everything it reaches, returning the assembled
    /// root schema
    pub(crate) fn run(mut self, location: &str) -> Result<Schema> {
        let root = self.assemble(location)?;
        Ok(self.entries.swap_remove(root).schema)
    }

    /// Load and settle everything `location` reaches, returning the index
    /// of the root entry
    fn assemble(&mut self, location: &str) -> Result<usize> {
        let document = self
            .resolver
            .resolve(&ResolveRequest::root(location))?
            .ok_or_else(|| {
                Error::schema(
                    ErrorKind::DocumentNotFound,
                    format!("schema document '{}' not found", location),
                )
            })?;
        let system_id = document.system_id.clone();
        let namespace = self.parse_document(document)?;
        let root = self.entry(&system_id, &namespace)?;
        self.load_entry(root, 0)?;
        self.settle()?;

        if let Some(entry) = self.entries.iter().find(|e| e.state != LoadState::Loaded) {
            return Err(Error::Schema(
                SchemaError::new(
                    ErrorKind::CircularDependency,
                    format!("schema document '{}' never finished loading", entry.system_id),
                )
                .with_system_id(entry.system_id.clone()),
            ));
        }
        debug!(
            documents = self.entries.len(),
            merges = self.merges,
            system_id = %system_id,
            "schema assembled"
        );
        Ok(root)
    }

    /// Parse a resolved document once per system id, returning its target
    /// namespace
    fn parse_document(&mut self, document: ResolvedDocument) -> Result<String> {
        if let Some(parsed) = self.documents.get(&document.system_id) {
            return Ok(parsed.schema.target_namespace.clone());
        }
        let (text, system_id) = read_document(document, &self.options.limits)?;
        trace!(system_id = %system_id, bytes = text.len(), "parsing schema document");
        let parsed = parse_schema_document(&text, &system_id)?;
        let namespace = parsed.schema.target_namespace.clone();
        self.documents.insert(system_id, parsed);
        self.options.limits.check_document_count(self.documents.len())?;
        Ok(namespace)
    }

    /// Find or create the entry of a parsed document
    fn entry(&mut self, system_id: &str, effective_namespace: &str) -> Result<usize> {
        let key = (system_id.to_string(), effective_namespace.to_string());
        if let Some(&idx) = self.index.get(&key) {
            return Ok(idx);
        }
        let parsed = self.documents.get(system_id).ok_or_else(|| {
            Error::schema(
                ErrorKind::DocumentNotFound,
                format!("schema document '{}' was not parsed", system_id),
            )
        })?;
        let idx = self.entries.len();
        self.entries.push(LoadEntry {
            system_id: system_id.to_string(),
            effective_namespace: effective_namespace.to_string(),
            state: LoadState::Unknown,
            schema: parsed.schema.clone(),
            directives: parsed.directives.clone(),
            pending: Vec::new(),
            pending_count: 0,
            splices: Vec::new(),
            revision: 0,
        });
        self.index.insert(key, idx);
        Ok(idx)
    }

    fn load_entry(&mut self, idx: usize, depth: usize) -> Result<()> {
        self.options.limits.check_directive_depth(depth)?;
        self.entries[idx].state = LoadState::Loading;
        debug!(
            system_id = %self.entries[idx].system_id,
            namespace = %self.entries[idx].effective_namespace,
            depth,
            "loading schema document"
        );
        for directive in 0..self.entries[idx].directives.len() {
            self.process_directive(idx, directive, depth)?;
        }
        self.entries[idx].state = LoadState::Loaded;
        self.drain(idx)
    }

    fn process_directive(&mut self, source: usize, directive: usize, depth: usize) -> Result<()> {
        let (kind, location, namespace) = {
            let d = &self.entries[source].directives[directive];
            (d.kind, d.location.clone(), d.namespace.clone())
        };
        let source_namespace = self.entries[source].effective_namespace.clone();
        let source_id = self.entries[source].system_id.clone();
        let declared = namespace.clone().unwrap_or_default();

        if kind == DirectiveKind::Import {
            if declared == source_namespace {
                return Err(self.mismatch(
                    &source_id,
                    if declared.is_empty() {
                        "a schema without a target namespace cannot import the empty namespace"
                            .to_string()
                    } else {
                        format!(
                            "import of namespace '{}' into a schema with the same target namespace",
                            declared
                        )
                    },
                ));
            }
            self.entries[source].schema.add_import(&source_namespace, &declared);
        }

        let resolver = match (kind, namespace.as_deref()) {
            (DirectiveKind::Import, Some(ns)) => self.options.namespace_resolvers.get(ns).cloned(),
            _ => None,
        };
        let location = match (location, &resolver) {
            (Some(location), _) => location,
            (None, Some(_)) => declared.clone(),
            (None, None) => {
                trace!(namespace = %declared, "import without schemaLocation");
                return Ok(());
            }
        };
        let request = ResolveRequest {
            base_system_id: Some(&source_id),
            location: &location,
            kind: Some(kind),
            namespace: namespace.as_deref(),
        };
        let resolved = match &resolver {
            Some(resolver) => resolver.resolve(&request)?,
            None => self.resolver.resolve(&request)?,
        };
        let Some(document) = resolved else {
            return self.missing(kind, &location, &source_id);
        };

        let system_id = document.system_id.clone();
        if system_id == source_id || self.entries[source].schema.merged_documents.contains(&system_id) {
            trace!(system_id = %system_id, "already merged");
            return Ok(());
        }
        let target_namespace = self.parse_document(document)?;
        match kind {
            DirectiveKind::Import if target_namespace != declared => {
                return Err(self.mismatch(
                    &source_id,
                    format!(
                        "imported document '{}' has target namespace '{}', expected '{}'",
                        system_id, target_namespace, declared
                    ),
                ));
            }
            DirectiveKind::Include | DirectiveKind::Redefine
                if !include_compatible(&source_namespace, &target_namespace) =>
            {
                return Err(self.mismatch(
                    &source_id,
                    format!(
                        "document '{}' of xs:{} has target namespace '{}', expected '{}' or none",
                        system_id, kind, target_namespace, source_namespace
                    ),
                ));
            }
            _ => {}
        }

        let effective = if target_namespace.is_empty() && kind != DirectiveKind::Import {
            source_namespace
        } else {
            target_namespace
        };
        let target = self.entry(&system_id, &effective)?;
        if target == source {
            return Ok(());
        }
        if self.entries[target].state == LoadState::Unknown {
            self.load_entry(target, depth + 1)?;
        }

        let entry = &self.entries[target];
        if entry.state == LoadState::Loaded && entry.pending_count == 0 {
            self.apply(source, target, directive)
        } else {
            debug!(
                source = %source_id,
                target = %system_id,
                kind = %kind,
                "deferring directive"
            );
            self.entries[target]
                .pending
                .push(PendingDirective { source, directive });
            self.entries[source].pending_count += 1;
            Ok(())
        }
    }

    fn missing(&self, kind: DirectiveKind, location: &str, source_id: &str) -> Result<()> {
        match kind {
            DirectiveKind::Include => {
                warn!(location, source = source_id, "included document not found, skipping");
                Ok(())
            }
            DirectiveKind::Import if self.options.allow_missing_import_locations => {
                warn!(location, source = source_id, "imported document not found, skipping");
                Ok(())
            }
            _ => Err(Error::Schema(
                SchemaError::new(
                    ErrorKind::DocumentNotFound,
                    format!("document '{}' of xs:{} not found", location, kind),
                )
                .with_system_id(source_id),
            )),
        }
    }

    fn mismatch(&self, source_id: &str, message: String) -> Error {
        Error::Schema(
            SchemaError::new(ErrorKind::NamespaceMismatch, message).with_system_id(source_id),
        )
    }

    /// Merge the target of a directive into its source
    fn apply(&mut self, source: usize, target: usize, directive: usize) -> Result<()> {
        let (kind, position) = {
            let d = &self.entries[source].directives[directive];
            (d.kind, d.position)
        };
        let at = match kind {
            DirectiveKind::Import => None,
            _ => Some(self.entries[source].splice_position(directive, position)),
        };
        let added = self.merge_into(source, target, kind, at)?;
        if kind != DirectiveKind::Import {
            self.entries[source].splices.push(Splice {
                directive,
                position,
                count: added,
            });
        }
        if kind == DirectiveKind::Redefine {
            let redefinitions = mem::take(&mut self.entries[source].directives[directive].redefinitions);
            let system_id = self.entries[source].system_id.clone();
            apply_redefinitions(&mut self.entries[source].schema, redefinitions, &system_id)?;
            self.entries[source].revision += 1;
        }
        self.edges.push(Edge {
            source,
            target,
            directive,
            merged_revision: self.entries[target].revision,
        });
        Ok(())
    }

    fn merge_into(
        &mut self,
        source: usize,
        target: usize,
        kind: DirectiveKind,
        position: Option<usize>,
    ) -> Result<usize> {
        let snapshot = self.entries[target].schema.clone();
        let added = merge_schema(
            &mut self.entries[source].schema,
            snapshot,
            MergeMode::new(kind, position),
        )?;
        self.merges += 1;
        if added > 0 {
            self.entries[source].revision += 1;
        }
        let schema = &self.entries[source].schema;
        self.options
            .limits
            .check_component_count(schema.component_count())?;
        trace!(
            source = %self.entries[source].system_id,
            target = %self.entries[target].system_id,
            added,
            "merged"
        );
        Ok(added)
    }

    /// Merge every directive waiting on `idx` once it has drained, then
    /// cascade to the sources that became ready
    fn drain(&mut self, idx: usize) -> Result<()> {
        let mut work = vec![idx];
        while let Some(target) = work.pop() {
            let entry = &self.entries[target];
            if entry.state != LoadState::Loaded || entry.pending_count > 0 {
                continue;
            }
            for pending in mem::take(&mut self.entries[target].pending) {
                self.apply(pending.source, target, pending.directive)?;
                let source = &mut self.entries[pending.source];
                source.pending_count = source.pending_count.saturating_sub(1);
                if source.pending_count == 0 {
                    work.push(pending.source);
                }
            }
        }
        Ok(())
    }

    /// Resolve what deferral could not: directives still waiting form
    /// cycles, so merge them and re-merge every edge until a fixpoint
    fn settle(&mut self) -> Result<()> {
        let mut deferred = Vec::new();
        for target in 0..self.entries.len() {
            for pending in mem::take(&mut self.entries[target].pending) {
                deferred.push((pending, target));
            }
        }
        if deferred.is_empty() {
            return Ok(());
        }
        debug!(directives = deferred.len(), "settling directive cycles");
        for (pending, target) in deferred {
            self.entries[pending.source].pending_count = 0;
            self.apply(pending.source, target, pending.directive)?;
        }

        for _ in 0..=self.entries.len() {
            let mut added = 0;
            for index in 0..self.edges.len() {
                let edge = self.edges[index];
                let kind = self.entries[edge.source].directives[edge.directive].kind;
                let revision = self.entries[edge.target].revision;
                // Only targets that grew since their last merge have anything new
                if kind == DirectiveKind::Redefine || revision == edge.merged_revision {
                    continue;
                }
                added += self.merge_into(edge.source, edge.target, kind, None)?;
                self.edges[index].merged_revision = revision;
            }
            if added == 0 {
                return Ok(());
            }
        }
        Err(Error::schema(
            ErrorKind::CircularDependency,
            "directive cycle does not reach a stable assembly",
        ))
    }
}

/// Replace merged components by their redefinitions, keeping the originals
/// for self-references
pub fn apply_redefinitions(
    schema: &mut Schema,
    redefinitions: Redefinitions,
    system_id: &str,
) -> Result<()> {
    let unknown = |kind: ErrorKind, what: ComponentKind, name: &dyn std::fmt::Display| {
        Error::Schema(
            SchemaError::new(
                kind,
                format!("redefined {} '{}' is not in the redefined schema", what, name),
            )
            .with_system_id(system_id),
        )
    };

    for def in redefinitions.types {
        let name = def.name().clone();
        let original = schema
            .types
            .insert(name.clone(), def)
            .ok_or_else(|| unknown(ErrorKind::UnknownType, ComponentKind::Type, &name))?;
        schema.redefined_types.insert(name.clone(), original);
        schema
            .origins
            .insert((ComponentKind::Type, name), system_id.to_string());
    }
    for group in redefinitions.groups {
        let name = group.name.clone();
        let original = schema
            .groups
            .insert(name.clone(), group)
            .ok_or_else(|| unknown(ErrorKind::UnknownGroup, ComponentKind::Group, &name))?;
        schema.redefined_groups.insert(name.clone(), original);
        schema
            .origins
            .insert((ComponentKind::Group, name), system_id.to_string());
    }
    for group in redefinitions.attribute_groups {
        let name = group.name.clone();
        let original = schema
            .attribute_groups
            .insert(name.clone(), group)
            .ok_or_else(|| {
                unknown(ErrorKind::UnknownAttributeGroup, ComponentKind::AttributeGroup, &name)
            })?;
        schema.redefined_attribute_groups.insert(name.clone(), original);
        schema
            .origins
            .insert((ComponentKind::AttributeGroup, name), system_id.to_string());
    }
    Ok(())
}
