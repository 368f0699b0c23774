use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

pub type ThreadId = u64;
pub type FrameId = u64;
pub type ObjectId = u64;
pub type ReferenceTypeId = u64;
pub type MethodId = u64;
pub type FieldId = u64;

/// Opaque token for an open debuggee connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(pub u64);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachOptions {
    pub addr: SocketAddr,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub main_class: String,
    pub classpath: Vec<PathBuf>,
    pub vm_args: Vec<String>,
    pub args: Vec<String>,
    /// Keep the VM suspended until the first resume.
    pub suspend: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub type_id: ReferenceTypeId,
    pub method_id: MethodId,
    pub index: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassInfo {
    pub type_id: ReferenceTypeId,
    /// JVM signature, e.g. `Lcom/example/Main;`.
    pub signature: String,
    pub source_file: Option<String>,
    pub status: u32,
}

impl ClassInfo {
    /// Binary class name (`com.example.Main`) derived from the signature.
    pub fn name(&self) -> String {
        signature_to_class_name(&self.signature)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodInfo {
    pub method_id: MethodId,
    pub name: String,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    pub field_id: FieldId,
    pub name: String,
    pub signature: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineTableEntry {
    pub code_index: u64,
    pub line: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineTable {
    pub start: u64,
    pub end: u64,
    pub lines: Vec<LineTableEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrameInfo {
    pub id: FrameId,
    pub location: Location,
    pub name: String,
    pub source_path: Option<String>,
    pub line: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum JdwpValue {
    Null,
    Void,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Object(ObjectRef),
}

impl JdwpValue {
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::Object(obj) => Some(obj.id),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectRef {
    pub id: ObjectId,
    pub runtime_type: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JdwpVariable {
    pub name: String,
    pub value: JdwpValue,
    pub static_type: Option<String>,
}

/// A source-level description of something a request should be pinned to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetQuery {
    /// Every code location for `line` across the loaded types compiled from `source_file`.
    SourceLine { source_file: String, line: u32 },
    /// A field of a loaded class.
    Field { class: String, field: String },
    /// A loaded class by binary name.
    Class { class: String },
    /// A live thread.
    Thread { thread: ThreadId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhysicalTarget {
    Location(Location),
    Field {
        type_id: ReferenceTypeId,
        field_id: FieldId,
    },
    Class(ReferenceTypeId),
    Thread(ThreadId),
}

/// `com.example.Foo` -> `Lcom/example/Foo;`
pub fn class_name_to_signature(class_name: &str) -> String {
    if class_name.starts_with('L') && class_name.ends_with(';') {
        return class_name.to_string();
    }
    let internal = class_name.replace('.', "/");
    format!("L{internal};")
}

/// `Lcom/example/Foo;` -> `com.example.Foo`
pub fn signature_to_class_name(signature: &str) -> String {
    signature
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .unwrap_or(signature)
        .replace('/', ".")
}
