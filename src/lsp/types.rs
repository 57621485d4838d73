//! LSP protocol types: JSON-RPC 2.0 envelopes plus the handful of
//! language-server structures the pipeline consumes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ─── JSON-RPC 2.0 Base Types ────────────────────────────────────

/// An outgoing JSON-RPC request.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

/// An outgoing JSON-RPC notification (no id, no response).
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: P,
}

/// An outgoing response to a request the server sent us.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    pub result: Value,
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Any message read from the server, before classification.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// What an incoming message turned out to be.
#[derive(Debug)]
pub enum ServerMessage {
    /// Answer to one of our requests.
    Response {
        id: u64,
        outcome: Result<Value, JsonRpcError>,
    },
    /// A request the server expects us to answer.
    Request { id: Value, method: String },
    Notification { method: String, params: Value },
}

impl IncomingMessage {
    /// Classify by the presence of `id` and `method`. Returns `None` for
    /// messages that fit none of the JSON-RPC shapes we understand.
    pub fn classify(self) -> Option<ServerMessage> {
        match (self.id, self.method) {
            (Some(id), None) => {
                let id = id.as_u64()?;
                let outcome = match self.error {
                    Some(err) => Err(err),
                    None => Ok(self.result.unwrap_or(Value::Null)),
                };
                Some(ServerMessage::Response { id, outcome })
            }
            (Some(id), Some(method)) => Some(ServerMessage::Request { id, method }),
            (None, Some(method)) => Some(ServerMessage::Notification {
                method,
                params: self.params,
            }),
            (None, None) => None,
        }
    }
}

// ─── Text Positions ─────────────────────────────────────────────

/// Zero-based line/character position. Orders by line, then character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open text range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// True if `other` lies entirely within this range.
    pub fn contains(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Number of source lines the range touches.
    pub fn line_count(&self) -> usize {
        self.end.line.saturating_sub(self.start.line) as usize + 1
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line + 1,
            self.start.character + 1,
            self.end.line + 1,
            self.end.character + 1
        )
    }
}

/// A range inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

// ─── Symbols ────────────────────────────────────────────────────

/// LSP symbol kinds (numeric on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum SymbolKind {
    File,
    Module,
    Namespace,
    Package,
    Class,
    Method,
    Property,
    Field,
    Constructor,
    Enum,
    Interface,
    Function,
    Variable,
    Constant,
    String,
    Number,
    Boolean,
    Array,
    Object,
    Key,
    Null,
    EnumMember,
    Struct,
    Event,
    Operator,
    TypeParameter,
    /// A kind number outside the LSP 3.17 table.
    Unknown(u8),
}

const SYMBOL_KINDS: [SymbolKind; 26] = [
    SymbolKind::File,
    SymbolKind::Module,
    SymbolKind::Namespace,
    SymbolKind::Package,
    SymbolKind::Class,
    SymbolKind::Method,
    SymbolKind::Property,
    SymbolKind::Field,
    SymbolKind::Constructor,
    SymbolKind::Enum,
    SymbolKind::Interface,
    SymbolKind::Function,
    SymbolKind::Variable,
    SymbolKind::Constant,
    SymbolKind::String,
    SymbolKind::Number,
    SymbolKind::Boolean,
    SymbolKind::Array,
    SymbolKind::Object,
    SymbolKind::Key,
    SymbolKind::Null,
    SymbolKind::EnumMember,
    SymbolKind::Struct,
    SymbolKind::Event,
    SymbolKind::Operator,
    SymbolKind::TypeParameter,
];

impl From<u8> for SymbolKind {
    fn from(n: u8) -> Self {
        match n {
            1..=26 => SYMBOL_KINDS[(n - 1) as usize],
            other => SymbolKind::Unknown(other),
        }
    }
}

impl From<SymbolKind> for u8 {
    fn from(kind: SymbolKind) -> u8 {
        match kind {
            SymbolKind::Unknown(n) => n,
            known => SYMBOL_KINDS
                .iter()
                .position(|k| *k == known)
                .map(|i| i as u8 + 1)
                .unwrap_or(0),
        }
    }
}

impl SymbolKind {
    /// Namespace-like symbols. Reference queries against them report
    /// every extension and usage of the name, so the resolver skips them.
    pub fn is_namespace(&self) -> bool {
        matches!(
            self,
            SymbolKind::Namespace | SymbolKind::Module | SymbolKind::Package
        )
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::EnumMember => write!(f, "Enum Member"),
            SymbolKind::TypeParameter => write!(f, "Type Parameter"),
            SymbolKind::Unknown(n) => write!(f, "Symbol({})", n),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Hierarchical outline entry (`textDocument/documentSymbol`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSymbol {
    pub name: String,
    #[serde(default)]
    pub detail: Option<String>,
    pub kind: SymbolKind,
    pub range: Range,
    pub selection_range: Range,
    #[serde(default)]
    pub children: Option<Vec<DocumentSymbol>>,
}

/// Flat outline entry, sent by servers without hierarchical support.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInformation {
    pub name: String,
    pub kind: SymbolKind,
    pub location: Location,
    #[serde(default)]
    pub container_name: Option<String>,
}

/// Either shape of a `documentSymbol` result.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DocumentSymbolResponse {
    Nested(Vec<DocumentSymbol>),
    Flat(Vec<SymbolInformation>),
}

impl DocumentSymbolResponse {
    /// Normalize to the hierarchical shape. Flat entries become top-level
    /// symbols whose location doubles as the selection range.
    pub fn into_nested(self) -> Vec<DocumentSymbol> {
        match self {
            DocumentSymbolResponse::Nested(symbols) => symbols,
            DocumentSymbolResponse::Flat(infos) => infos
                .into_iter()
                .map(|info| DocumentSymbol {
                    name: info.name,
                    detail: info.container_name,
                    kind: info.kind,
                    range: info.location.range,
                    selection_range: info.location.range,
                    children: None,
                })
                .collect(),
        }
    }
}

// ─── Request Params ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub process_id: u32,
    pub root_uri: String,
    pub root_path: String,
    pub capabilities: Value,
    pub workspace_folders: Vec<WorkspaceFolder>,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceFolder {
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TextDocumentIdentifier<'a> {
    pub uri: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentItem<'a> {
    pub uri: &'a str,
    pub language_id: &'a str,
    pub version: i32,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DidOpenTextDocumentParams<'a> {
    pub text_document: TextDocumentItem<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSymbolParams<'a> {
    pub text_document: TextDocumentIdentifier<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceContext {
    pub include_declaration: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceParams<'a> {
    pub text_document: TextDocumentIdentifier<'a>,
    pub position: Position,
    pub context: ReferenceContext,
}
