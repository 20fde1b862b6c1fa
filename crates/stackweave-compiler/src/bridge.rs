//! Synthesized bridges for private member access across nest types.
//!
//! Types nested in the same top-level type may use each other's private
//! members, but the target machine only lets a type touch its own private
//! members. When a routine of one nest type reads a private field, calls a
//! private method or invokes a private constructor of another nest type, the
//! access is rewritten to go through a synthesized, package-visible bridge
//! declared on the owning type:
//!
//! | Access | Bridge | Rewritten access |
//! |--------|--------|------------------|
//! | field read | static `accessor$N(receiver)` returning the field | static call |
//! | method call | static `accessor$N(receiver, args..)` forwarding the call | static call |
//! | constructor | constructor taking an extra marker-type parameter | `new` with a trailing `null` |
//!
//! Bridges are memoized by member, so every requester of the same member
//! shares one bridge. Field writes are not bridged.

use rustc_hash::FxHashMap;
use stackweave_core::{
    ConstructorDecl, InvokeKind, MethodDecl, MethodSpec, Modifiers, Node, Param, TypeDecl,
    TypeRef, well_known,
};
use stackweave_registry::TypeNest;
use tracing::debug;

/// Name of the receiver parameter of instance-member bridges.
const RECEIVER_PARAM: &str = "$receiver";
/// Name of the marker parameter of constructor bridges.
const MARKER_PARAM: &str = "access$";

/// Identity of a bridged member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRef {
    Field { owner: TypeRef, name: String },
    Method { owner: TypeRef, spec: MethodSpec },
    Constructor { owner: TypeRef, params: Vec<TypeRef> },
}

impl MemberRef {
    pub fn owner(&self) -> &TypeRef {
        match self {
            MemberRef::Field { owner, .. }
            | MemberRef::Method { owner, .. }
            | MemberRef::Constructor { owner, .. } => owner,
        }
    }
}

/// The member a bridge declares on its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeDecl {
    Method(MethodDecl),
    Constructor(ConstructorDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bridge {
    pub member: MemberRef,
    /// Types whose accesses were rewritten to this bridge, in first-use order.
    pub requesters: Vec<TypeRef>,
    pub declaration: BridgeDecl,
}

impl Bridge {
    pub fn owner(&self) -> &TypeRef {
        self.member.owner()
    }
}

/// Memo of every bridge synthesized for one nest.
#[derive(Debug, Default)]
pub struct BridgeRegistry {
    bridges: Vec<Bridge>,
    index: FxHashMap<MemberRef, usize>,
    /// Next accessor number per owning type.
    accessor_counters: FxHashMap<TypeRef, usize>,
    /// Next marker-type number, shared by the whole nest.
    marker_counter: usize,
    synthetic_types: Vec<TypeDecl>,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bridges(&self) -> &[Bridge] {
        &self.bridges
    }

    /// Bridges registered at or after position `start`.
    pub fn pending_from(&self, start: usize) -> &[Bridge] {
        self.bridges.get(start..).unwrap_or(&[])
    }

    /// Marker types created for constructor bridges.
    pub fn synthetic_types(&self) -> &[TypeDecl] {
        &self.synthetic_types
    }

    pub fn get(&self, member: &MemberRef) -> Option<&Bridge> {
        self.index.get(member).map(|&i| &self.bridges[i])
    }

    pub fn len(&self) -> usize {
        self.bridges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty()
    }

    /// Rewrite `access` into a use of a bridge if it reaches a private
    /// member of another nest type.
    ///
    /// Returns `None` when the access can be emitted as is. `access` must
    /// already have its aliases resolved.
    pub fn resolve_access(
        &mut self,
        nest: &TypeNest,
        requester: &TypeRef,
        access: &Node,
    ) -> Option<Node> {
        match access {
            Node::FieldAccess {
                owner,
                name,
                ty,
                receiver,
            } => {
                let field = nest.find_field(owner, name)?;
                if !crosses_nest(nest, requester, owner, field.modifiers) {
                    return None;
                }
                let is_static = field.modifiers.is_static();
                let member = MemberRef::Field {
                    owner: owner.clone(),
                    name: name.clone(),
                };
                let bridge = self.memoize(member, requester, |registry| {
                    registry.field_accessor(owner, name, ty, is_static)
                });
                let spec = accessor_spec(bridge)?;
                let args = if is_static {
                    Vec::new()
                } else {
                    vec![receiver_or_this(receiver)]
                };
                Some(Node::invoke(InvokeKind::Static, owner.clone(), spec, None, args))
            }

            Node::Invocation {
                owner,
                method,
                receiver,
                args,
                ..
            } => {
                let decl = nest.find_method(owner, method)?;
                if !crosses_nest(nest, requester, owner, decl.modifiers) {
                    return None;
                }
                let is_static = decl.modifiers.is_static();
                let names: Vec<String> = decl.params.iter().map(|p| p.name.clone()).collect();
                let member = MemberRef::Method {
                    owner: owner.clone(),
                    spec: method.clone(),
                };
                let bridge = self.memoize(member, requester, |registry| {
                    registry.method_forwarder(owner, method, &names, is_static)
                });
                let spec = accessor_spec(bridge)?;
                let mut forwarded = Vec::with_capacity(args.len() + 1);
                if !is_static {
                    forwarded.push(receiver_or_this(receiver));
                }
                forwarded.extend(args.iter().cloned());
                Some(Node::invoke(InvokeKind::Static, owner.clone(), spec, None, forwarded))
            }

            Node::New { ty, params, args } => {
                let decl = nest.find_constructor(ty, params)?;
                if !crosses_nest(nest, requester, ty, decl.modifiers) {
                    return None;
                }
                let names: Vec<String> = decl.params.iter().map(|p| p.name.clone()).collect();
                let member = MemberRef::Constructor {
                    owner: ty.clone(),
                    params: params.clone(),
                };
                let bridge = self.memoize(member, requester, |registry| {
                    registry.constructor_bridge(nest, ty, params, &names)
                });
                let BridgeDecl::Constructor(ctor) = &bridge.declaration else {
                    return None;
                };
                let mut args = args.clone();
                args.push(Node::null());
                Some(Node::New {
                    ty: ty.clone(),
                    params: ctor.param_types(),
                    args,
                })
            }

            _ => None,
        }
    }

    fn memoize(
        &mut self,
        member: MemberRef,
        requester: &TypeRef,
        build: impl FnOnce(&mut Self) -> BridgeDecl,
    ) -> &Bridge {
        let index = match self.index.get(&member) {
            Some(&index) => index,
            None => {
                let declaration = build(self);
                debug!(owner = %member.owner(), ?declaration, "bridge synthesized");
                self.bridges.push(Bridge {
                    member: member.clone(),
                    requesters: Vec::new(),
                    declaration,
                });
                let index = self.bridges.len() - 1;
                self.index.insert(member, index);
                index
            }
        };
        let bridge = &mut self.bridges[index];
        if !bridge.requesters.contains(requester) {
            bridge.requesters.push(requester.clone());
        }
        &self.bridges[index]
    }

    fn next_accessor_name(&mut self, owner: &TypeRef) -> String {
        let counter = self.accessor_counters.entry(owner.clone()).or_insert(0);
        let name = format!("accessor${counter}");
        *counter += 1;
        name
    }

    fn field_accessor(
        &mut self,
        owner: &TypeRef,
        name: &str,
        ty: &TypeRef,
        is_static: bool,
    ) -> BridgeDecl {
        let accessor = self.next_accessor_name(owner);
        let (params, receiver) = if is_static {
            (Vec::new(), None)
        } else {
            (
                vec![Param::new(RECEIVER_PARAM, owner.clone())],
                Some(Box::new(Node::var(RECEIVER_PARAM, owner.clone()))),
            )
        };
        let read = Node::FieldAccess {
            owner: owner.clone(),
            name: name.to_string(),
            ty: ty.clone(),
            receiver,
        };
        BridgeDecl::Method(
            MethodDecl::new(accessor, bridge_modifiers(), ty.clone(), params)
                .with_body(Node::ret(Some(read))),
        )
    }

    fn method_forwarder(
        &mut self,
        owner: &TypeRef,
        method: &MethodSpec,
        names: &[String],
        is_static: bool,
    ) -> BridgeDecl {
        let accessor = self.next_accessor_name(owner);
        let mut params = Vec::with_capacity(method.params.len() + 1);
        if !is_static {
            params.push(Param::new(RECEIVER_PARAM, owner.clone()));
        }
        let args: Vec<Node> = method
            .params
            .iter()
            .zip(names)
            .map(|(ty, name)| {
                params.push(Param::new(name.clone(), ty.clone()));
                Node::var(name.clone(), ty.clone())
            })
            .collect();

        let (kind, receiver) = if is_static {
            (InvokeKind::Static, None)
        } else {
            (
                InvokeKind::Special,
                Some(Node::var(RECEIVER_PARAM, owner.clone())),
            )
        };
        let call = Node::invoke(kind, owner.clone(), method.clone(), receiver, args);
        let body = if method.return_type.is_void() {
            Node::seq(vec![call, Node::ret(None)])
        } else {
            Node::ret(Some(call))
        };

        BridgeDecl::Method(
            MethodDecl::new(accessor, bridge_modifiers(), method.return_type.clone(), params)
                .with_body(body),
        )
    }

    fn constructor_bridge(
        &mut self,
        nest: &TypeNest,
        owner: &TypeRef,
        params: &[TypeRef],
        names: &[String],
    ) -> BridgeDecl {
        let marker = self.new_marker_type(nest, owner);

        let mut decl_params: Vec<Param> = params
            .iter()
            .zip(names)
            .map(|(ty, name)| Param::new(name.clone(), ty.clone()))
            .collect();
        let args: Vec<Node> = decl_params
            .iter()
            .map(|p| Node::var(p.name.clone(), p.ty.clone()))
            .collect();
        decl_params.push(Param::new(MARKER_PARAM, marker));

        let delegate = Node::invoke(
            InvokeKind::Special,
            owner.clone(),
            MethodSpec::new(well_known::CONSTRUCTOR, TypeRef::VOID, params.to_vec()),
            Some(Node::This),
            args,
        );
        BridgeDecl::Constructor(
            ConstructorDecl::new(Modifiers::SYNTHETIC, decl_params)
                .with_body(Node::seq(vec![delegate, Node::ret(None)])),
        )
    }

    /// Create the hidden nested type distinguishing a constructor bridge.
    fn new_marker_type(&mut self, nest: &TypeNest, owner: &TypeRef) -> TypeRef {
        let base = nest.outermost(owner);
        loop {
            let candidate = TypeRef::object(format!("{base}${}", self.marker_counter));
            self.marker_counter += 1;
            let taken = nest.get(&candidate).is_some()
                || self.synthetic_types.iter().any(|t| t.ty == candidate);
            if !taken {
                self.synthetic_types.push(
                    TypeDecl::class(candidate.to_string())
                        .with_outer(owner.clone())
                        .with_modifiers(Modifiers::STATIC | Modifiers::FINAL | Modifiers::SYNTHETIC),
                );
                return candidate;
            }
        }
    }
}

/// Private member of another type of the same nest.
fn crosses_nest(nest: &TypeNest, requester: &TypeRef, owner: &TypeRef, modifiers: Modifiers) -> bool {
    modifiers.is_private() && owner != requester && nest.contains(owner) && nest.contains(requester)
}

/// Static, non-overridable and hidden from source; no access modifier means package visible.
fn bridge_modifiers() -> Modifiers {
    Modifiers::STATIC | Modifiers::FINAL | Modifiers::SYNTHETIC
}

fn accessor_spec(bridge: &Bridge) -> Option<MethodSpec> {
    match &bridge.declaration {
        BridgeDecl::Method(method) => Some(method.spec()),
        BridgeDecl::Constructor(_) => None,
    }
}

fn receiver_or_this(receiver: &Option<Box<Node>>) -> Node {
    receiver.as_deref().cloned().unwrap_or(Node::This)
}
