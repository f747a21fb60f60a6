//! Structured query types.
//!
//! Provides the structured form of a content store query before encoding:
//! - QuerySpec: populate, filters, sort, pagination, fields
//! - Populate / Relation: which related entities to inline
//! - Filters: field path to comparison-operator mapping

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use super::QueryError;

/// Structured query against one content store collection.
///
/// Every part is optional; an empty spec encodes to an empty string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    /// Relations to inline in the response.
    pub populate: Option<Populate>,

    /// Filter conditions.
    pub filters: Filters,

    /// Sort order, `field` or `field:asc|desc`.
    pub sort: Vec<String>,

    /// Page or offset window.
    pub pagination: Option<Pagination>,

    /// Fields to project.
    pub fields: Vec<String>,
}

impl QuerySpec {
    /// An empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the populate instruction.
    pub fn with_populate(mut self, populate: Populate) -> Self {
        self.populate = Some(populate);
        self
    }

    /// Set the filters.
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// Set the sort order.
    pub fn with_sort<I, S>(mut self, sort: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = sort.into_iter().map(Into::into).collect();
        self
    }

    /// Set the pagination window.
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Set the projected fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the spec constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.populate.is_none()
            && self.filters.is_empty()
            && self.sort.is_empty()
            && self.pagination.is_none()
            && self.fields.is_empty()
    }

    /// Merge caller-supplied parameters into this spec.
    ///
    /// Filters and populate are additive (the extra side wins on a key
    /// collision). Sort, pagination and fields from `extra` replace ours
    /// when present.
    pub fn merge(mut self, extra: QuerySpec) -> Self {
        self.populate = match (self.populate.take(), extra.populate) {
            (base, None) => base,
            (None, extra) => extra,
            (Some(base), Some(extra)) => Some(base.merge(extra)),
        };
        self.filters.merge(extra.filters);
        if !extra.sort.is_empty() {
            self.sort = extra.sort;
        }
        if extra.pagination.is_some() {
            self.pagination = extra.pagination;
        }
        if !extra.fields.is_empty() {
            self.fields = extra.fields;
        }
        self
    }

    /// The non-empty top-level sections in encoding order.
    pub(crate) fn sections(&self) -> Vec<(&'static str, Value)> {
        let mut sections = Vec::with_capacity(5);
        if let Some(populate) = &self.populate {
            sections.push(("populate", populate.to_value()));
        }
        if !self.filters.is_empty() {
            sections.push(("filters", Value::Object(self.filters.0.clone())));
        }
        if !self.sort.is_empty() {
            sections.push(("sort", json!(self.sort)));
        }
        if let Some(pagination) = &self.pagination {
            sections.push(("pagination", pagination.to_value()));
        }
        if !self.fields.is_empty() {
            sections.push(("fields", json!(self.fields)));
        }
        sections
    }

    /// Nested object form, as used inside a populate relation.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.sections()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    /// Lift a decoded query tree back into a spec.
    ///
    /// Rejects unknown top-level parameters and malformed values.
    pub fn from_value(value: Value) -> Result<Self, QueryError> {
        let Value::Object(map) = value else {
            return Err(QueryError::invalid("query", "expected a parameter map"));
        };

        let mut spec = QuerySpec::new();
        for (key, value) in map {
            match key.as_str() {
                "populate" => spec.populate = Some(Populate::from_value(value)?),
                "filters" => spec.filters = Filters::from_value(value)?,
                "sort" => spec.sort = string_list("sort", value)?,
                "pagination" => spec.pagination = Some(Pagination::from_value(value)?),
                "fields" => spec.fields = string_list("fields", value)?,
                _ => return Err(QueryError::UnknownParameter(key)),
            }
        }
        Ok(spec)
    }
}

/// Which relations the content store should inline.
#[derive(Debug, Clone, PartialEq)]
pub enum Populate {
    /// Every first-level relation (`populate=*`).
    All,
    /// Named relations, in order (`populate[0]=a&populate[1]=b`).
    List(Vec<String>),
    /// Relation name to inclusion or a nested query.
    Map(BTreeMap<String, Relation>),
}

impl Populate {
    /// Ordered list of relation names.
    pub fn list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Populate::List(names.into_iter().map(Into::into).collect())
    }

    /// Relation map from `(name, relation)` pairs.
    pub fn map<I, S>(relations: I) -> Self
    where
        I: IntoIterator<Item = (S, Relation)>,
        S: Into<String>,
    {
        Populate::Map(
            relations
                .into_iter()
                .map(|(name, relation)| (name.into(), relation))
                .collect(),
        )
    }

    /// Combine with caller-supplied populate instructions.
    ///
    /// A wildcard on either side wins over named relations and two lists are
    /// unioned in order. Anything else is merged as a map; a relation named
    /// on both sides is merged with [`Relation::merge`].
    pub fn merge(self, extra: Populate) -> Populate {
        match (self, extra) {
            (_, Populate::All) | (Populate::All, _) => Populate::All,
            (Populate::List(mut names), Populate::List(more)) => {
                for name in more {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
                Populate::List(names)
            }
            (base, extra) => {
                let mut relations = base.into_relations();
                for (name, relation) in extra.into_relations() {
                    let merged = match relations.remove(&name) {
                        Some(existing) => existing.merge(relation),
                        None => relation,
                    };
                    relations.insert(name, merged);
                }
                Populate::Map(relations)
            }
        }
    }

    fn into_relations(self) -> BTreeMap<String, Relation> {
        match self {
            Populate::All => BTreeMap::new(),
            Populate::List(names) => names
                .into_iter()
                .map(|name| (name, Relation::Include))
                .collect(),
            Populate::Map(relations) => relations,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Populate::All => Value::String("*".to_string()),
            Populate::List(names) => json!(names),
            Populate::Map(relations) => Value::Object(
                relations
                    .iter()
                    .map(|(name, relation)| (name.clone(), relation.to_value()))
                    .collect(),
            ),
        }
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::String(s) if s == "*" => Ok(Populate::All),
            Value::String(s) => Ok(Populate::List(split_commas(&s))),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(name) => Ok(name),
                    _ => Err(QueryError::invalid("populate", "list entries must be names")),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Populate::List),
            Value::Object(map) => {
                let mut relations = BTreeMap::new();
                for (name, value) in map {
                    if let Some(relation) = Relation::from_value(&name, value)? {
                        relations.insert(name, relation);
                    }
                }
                Ok(Populate::Map(relations))
            }
            _ => Err(QueryError::invalid("populate", "expected `*`, a list or a map")),
        }
    }
}

/// How a single named relation is populated.
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
    /// `populate[name]=true`.
    Include,
    /// `populate[name][populate]...` and friends.
    Nested(Box<QuerySpec>),
}

impl Relation {
    /// Relation with its own query.
    pub fn nested(spec: QuerySpec) -> Self {
        Relation::Nested(Box::new(spec))
    }

    /// Relation whose own relations are all populated (`{populate: "*"}`).
    pub fn populate_all() -> Self {
        Relation::nested(QuerySpec::new().with_populate(Populate::All))
    }

    /// Combine two instructions for the same relation.
    ///
    /// `Include` adds nothing to a nested query; two nested queries merge
    /// like top-level ones.
    pub fn merge(self, extra: Relation) -> Relation {
        match (self, extra) {
            (Relation::Include, Relation::Include) => Relation::Include,
            (Relation::Nested(spec), Relation::Include)
            | (Relation::Include, Relation::Nested(spec)) => Relation::Nested(spec),
            (Relation::Nested(base), Relation::Nested(extra)) => {
                Relation::nested((*base).merge(*extra))
            }
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Relation::Include => Value::Bool(true),
            Relation::Nested(spec) => spec.to_value(),
        }
    }

    fn from_value(name: &str, value: Value) -> Result<Option<Self>, QueryError> {
        match value {
            Value::Bool(true) => Ok(Some(Relation::Include)),
            Value::Bool(false) => Ok(None),
            Value::String(s) if s == "true" => Ok(Some(Relation::Include)),
            Value::String(s) if s == "false" => Ok(None),
            Value::Object(_) => QuerySpec::from_value(value).map(|spec| Some(Relation::nested(spec))),
            _ => Err(QueryError::invalid(
                "populate",
                format!("relation `{name}` must be true, false or a nested query"),
            )),
        }
    }
}

/// Result window plus the total-count toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    /// Which slice of the collection to return; the store's default when unset.
    pub window: Option<PageWindow>,
    /// `pagination[withCount]`: whether `meta.pagination` carries totals.
    pub with_count: Option<bool>,
}

/// Page-based or offset-based window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageWindow {
    /// `pagination[page]` / `pagination[pageSize]`.
    Page { page: u32, page_size: u32 },
    /// `pagination[start]` / `pagination[limit]`.
    Offset { start: u32, limit: u32 },
}

impl Pagination {
    /// Page-based window.
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            window: Some(PageWindow::Page { page, page_size }),
            with_count: None,
        }
    }

    /// Offset-based window.
    pub fn offset(start: u32, limit: u32) -> Self {
        Self {
            window: Some(PageWindow::Offset { start, limit }),
            with_count: None,
        }
    }

    /// Set `withCount`.
    pub fn with_count(mut self, with_count: bool) -> Self {
        self.with_count = Some(with_count);
        self
    }

    fn to_value(self) -> Value {
        let mut map = Map::new();
        match self.window {
            Some(PageWindow::Page { page, page_size }) => {
                map.insert("page".to_string(), json!(page));
                map.insert("pageSize".to_string(), json!(page_size));
            }
            Some(PageWindow::Offset { start, limit }) => {
                map.insert("start".to_string(), json!(start));
                map.insert("limit".to_string(), json!(limit));
            }
            None => {}
        }
        if let Some(with_count) = self.with_count {
            map.insert("withCount".to_string(), json!(with_count));
        }
        Value::Object(map)
    }

    fn from_value(value: Value) -> Result<Self, QueryError> {
        let Value::Object(mut map) = value else {
            return Err(QueryError::invalid("pagination", "expected a parameter map"));
        };

        let with_count = map
            .remove("withCount")
            .map(|v| parse_bool("withCount", &v))
            .transpose()?;

        let mut take = |key: &str| -> Result<Option<u32>, QueryError> {
            map.remove(key).map(|v| parse_u32(key, &v)).transpose()
        };
        let page = take("page")?;
        let page_size = take("pageSize")?;
        let start = take("start")?;
        let limit = take("limit")?;

        if let Some(unknown) = map.keys().next() {
            return Err(QueryError::invalid(
                "pagination",
                format!("unsupported key `{unknown}`"),
            ));
        }

        let window = match (page, page_size, start, limit) {
            (None, None, None, None) if with_count.is_none() => {
                return Err(QueryError::invalid("pagination", "empty window"));
            }
            (None, None, None, None) => None,
            (page, page_size, None, None) => Some(PageWindow::Page {
                page: page.unwrap_or(1),
                page_size: page_size.unwrap_or(25),
            }),
            (None, None, start, limit) => Some(PageWindow::Offset {
                start: start.unwrap_or(0),
                limit: limit.unwrap_or(25),
            }),
            _ => {
                return Err(QueryError::invalid(
                    "pagination",
                    "page/pageSize cannot be mixed with start/limit",
                ));
            }
        };

        Ok(Self { window, with_count })
    }
}

/// Comparison operators understood by the content store.
///
/// Filters accept any operator key; these are the ones this crate builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Contains,
    ContainsI,
    Null,
}

impl FilterOperator {
    /// Wire name, e.g. `$eq`.
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOperator::Eq => "$eq",
            FilterOperator::Ne => "$ne",
            FilterOperator::Lt => "$lt",
            FilterOperator::Lte => "$lte",
            FilterOperator::Gt => "$gt",
            FilterOperator::Gte => "$gte",
            FilterOperator::In => "$in",
            FilterOperator::Contains => "$contains",
            FilterOperator::ContainsI => "$containsi",
            FilterOperator::Null => "$null",
        }
    }
}

/// Field path to comparison-operator mapping.
///
/// Keys are kept sorted so the encoded form is canonical.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters(Map<String, Value>);

impl Filters {
    /// No filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no filter is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `field → {$eq: value}`.
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(&[field], FilterOperator::Eq, value)
    }

    /// Add a condition at a (possibly relational) field path.
    ///
    /// `with(&["product_category", "id"], Eq, 7)` yields
    /// `filters[product_category][id][$eq]=7`.
    pub fn with(mut self, path: &[&str], op: FilterOperator, value: impl Into<Value>) -> Self {
        let mut condition = Map::new();
        condition.insert(op.as_str().to_string(), value.into());
        let mut node = Value::Object(condition);
        for segment in path.iter().rev() {
            let mut parent = Map::new();
            parent.insert((*segment).to_string(), node);
            node = Value::Object(parent);
        }
        if let Value::Object(map) = node {
            merge_maps(&mut self.0, map);
        }
        self
    }

    /// Replace whatever condition a top-level field carries.
    pub fn set(&mut self, field: &str, condition: Value) {
        self.0.insert(field.to_string(), condition);
    }

    /// Deep-merge `other` into these filters; `other` wins at the leaves.
    pub fn merge(&mut self, other: Filters) {
        merge_maps(&mut self.0, other.0);
    }

    /// Borrow the raw mapping.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Build from a decoded `filters` tree.
    pub fn from_value(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(QueryError::invalid("filters", "expected a field map")),
        }
    }
}

impl From<Map<String, Value>> for Filters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn merge_maps(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match value {
            Value::Object(incoming) => match target.get_mut(&key) {
                Some(Value::Object(existing)) => merge_maps(existing, incoming),
                _ => {
                    target.insert(key, Value::Object(incoming));
                }
            },
            value => {
                target.insert(key, value);
            }
        }
    }
}

fn split_commas(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn string_list(param: &str, value: Value) -> Result<Vec<String>, QueryError> {
    match value {
        Value::String(s) => Ok(split_commas(&s)),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(QueryError::invalid(param, "list entries must be strings")),
            })
            .collect(),
        _ => Err(QueryError::invalid(param, "expected a string or a list")),
    }
}

fn parse_bool(key: &str, value: &Value) -> Result<bool, QueryError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        _ => Err(QueryError::invalid(
            "pagination",
            format!("`{key}` must be true or false"),
        )),
    }
}

fn parse_u32(key: &str, value: &Value) -> Result<u32, QueryError> {
    let parsed = match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        _ => None,
    };
    parsed.ok_or_else(|| {
        QueryError::invalid("pagination", format!("`{key}` must be a non-negative integer"))
    })
}
