use std::fmt;

use crate::{pointer::Offset, points_to::PointsToSet};

/// Index of a node in its owning subgraph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Reserved arena slot of the null-address sentinel.
    pub const NULL_ADDR: Self = NodeId(0);
    /// Reserved arena slot of the unknown-memory sentinel.
    pub const UNKNOWN_MEM: Self = NodeId(1);

    #[inline]
    pub(crate) const fn from_raw(raw: u32) -> Self {
        NodeId(raw)
    }

    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        assert!(index < u32::MAX as usize, "node index too large");
        NodeId(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// The closed family of node kinds. Each variant carries exactly the
/// operands its transfer function consumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Alloc,
    DynAlloc,
    Function,
    Noop,
    Entry,
    Cast {
        value: NodeId,
    },
    Load {
        ptr: NodeId,
    },
    Store {
        value: NodeId,
        dest: NodeId,
    },
    Gep {
        base: NodeId,
        offset: Offset,
    },
    Memcpy {
        src: NodeId,
        dst: NodeId,
        offset: Offset,
        len: Offset,
    },
    Phi(Vec<NodeId>),
    Call(Vec<NodeId>),
    CallFuncPtr {
        func: NodeId,
    },
    CallReturn(Vec<NodeId>),
    Return(Vec<NodeId>),
    Constant {
        target: NodeId,
        offset: Offset,
    },
    NullAddr,
    UnknownMem,
}

impl NodeKind {
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Alloc
            | NodeKind::DynAlloc
            | NodeKind::Function
            | NodeKind::Noop
            | NodeKind::Entry
            | NodeKind::Constant { .. }
            | NodeKind::NullAddr
            | NodeKind::UnknownMem => vec![],
            NodeKind::Cast { value: op }
            | NodeKind::Load { ptr: op }
            | NodeKind::CallFuncPtr { func: op }
            | NodeKind::Gep { base: op, .. } => vec![*op],
            NodeKind::Store { value, dest } => vec![*value, *dest],
            NodeKind::Memcpy { src, dst, .. } => vec![*src, *dst],
            NodeKind::Phi(ops)
            | NodeKind::Call(ops)
            | NodeKind::CallReturn(ops)
            | NodeKind::Return(ops) => ops.clone(),
        }
    }

    pub(crate) fn add_operand(&mut self, op: NodeId) {
        match self {
            NodeKind::Phi(ops)
            | NodeKind::Call(ops)
            | NodeKind::CallReturn(ops)
            | NodeKind::Return(ops) => ops.push(op),
            _ => panic!("cannot add an operand to {:?}", self),
        }
    }
}

/// A node of the pointer subgraph: its kind and operands plus the
/// graph-shared header (control-flow edges, allocation attributes, the
/// points-to set the solver computes).
pub struct PSNode {
    pub(crate) kind: NodeKind,
    pub(crate) successors: Vec<NodeId>,
    pub(crate) predecessors: Vec<NodeId>,
    pub(crate) points_to: PointsToSet,
    size: usize,
    zero_initialized: bool,
    heap: bool,
    name: Option<String>,
    pub(crate) dfsid: u32,
}

impl PSNode {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            successors: vec![],
            predecessors: vec![],
            points_to: PointsToSet::new(),
            size: 0,
            zero_initialized: false,
            heap: false,
            name: None,
            dfsid: 0,
        }
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn successors(&self) -> &[NodeId] {
        &self.successors
    }

    #[inline]
    pub fn predecessors(&self) -> &[NodeId] {
        &self.predecessors
    }

    #[inline]
    pub fn points_to(&self) -> &PointsToSet {
        &self.points_to
    }

    pub fn operands(&self) -> Vec<NodeId> {
        self.kind.operands()
    }

    pub fn operand(&self, idx: usize) -> NodeId {
        let ops = self.kind.operands();
        assert!(idx < ops.len(), "operand index out of range");
        ops[idx]
    }

    pub fn does_point_to(&self, ptr: crate::pointer::Pointer) -> bool {
        self.points_to.contains(ptr)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    #[inline]
    pub fn is_heap(&self) -> bool {
        self.heap
    }

    pub fn set_heap(&mut self) {
        self.heap = true;
    }

    #[inline]
    pub fn is_zero_initialized(&self) -> bool {
        self.zero_initialized
    }

    pub fn set_zero_initialized(&mut self) {
        self.zero_initialized = true;
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self.kind, NodeKind::NullAddr)
    }

    #[inline]
    pub fn is_unknown_memory(&self) -> bool {
        matches!(self.kind, NodeKind::UnknownMem)
    }
}

impl fmt::Debug for PSNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{:?} <{}> {:?}", self.kind, name, self.points_to),
            None => write!(f, "{:?} {:?}", self.kind, self.points_to),
        }
    }
}
