//! Memoization of generated gaskets.
//!
//! Every type gets at most one encoder and one decoder module per [Context],
//! however many times it is sent or received. Each use site only adds an
//! instance of the shared module.
use crate::decoder::build_decoder;
use crate::encoder::build_encoder;
use crate::schema::TypeSchema;
use esi_ir::{Builder, Context, Module, Type, ValueIdx};
use esi_utils::{Error, EsiResult, Id};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Copy)]
enum Direction {
    Encode,
    Decode,
}

impl Direction {
    fn prefix(self) -> &'static str {
        match self {
            Direction::Encode => "encode",
            Direction::Decode => "decode",
        }
    }
}

#[derive(Default)]
struct CacheState {
    /// Only modules of this context are cached.
    context: Option<u64>,
    schemas: HashMap<Type, Arc<TypeSchema>>,
    encoders: HashMap<Type, Id>,
    decoders: HashMap<Type, Id>,
}

impl CacheState {
    fn bind(&mut self, ctx: &Context) -> EsiResult<()> {
        match self.context {
            None => {
                self.context = Some(ctx.id());
                Ok(())
            }
            Some(id) if id == ctx.id() => Ok(()),
            Some(id) => Err(Error::malformed_structure(format!(
                "gasket cache belongs to context {id}, not context {}",
                ctx.id()
            ))),
        }
    }

    fn schema(&mut self, ty: &Type) -> Arc<TypeSchema> {
        let key = unwrap_channel(ty);
        self.schemas
            .entry(key.clone())
            .or_insert_with(|| Arc::new(TypeSchema::new(key.clone())))
            .clone()
    }

    fn module(&mut self, ctx: &mut Context, ty: &Type, dir: Direction) -> EsiResult<Id> {
        self.bind(ctx)?;
        let key = unwrap_channel(ty).clone();
        let cached = match dir {
            Direction::Encode => self.encoders.get(&key),
            Direction::Decode => self.decoders.get(&key),
        };
        if let Some(name) = cached {
            log::trace!("Reusing `{name}' for `{key}'");
            return Ok(*name);
        }

        let schema = self.schema(&key);
        let mut module = match dir {
            Direction::Encode => build_encoder(&schema),
            Direction::Decode => build_decoder(&schema),
        }
        .map_err(|e| {
            e.with_post_msg(Some(format!(
                "while generating the {}r for `{key}'",
                dir.prefix()
            )))
        })?;
        module.name = unique_module_name(ctx, module.name);
        let name = module.name;
        ctx.add_module(module)?;
        match dir {
            Direction::Encode => self.encoders.insert(key, name),
            Direction::Decode => self.decoders.insert(key, name),
        };
        Ok(name)
    }
}

fn unwrap_channel(ty: &Type) -> &Type {
    match ty {
        Type::Channel(inner) => inner,
        ty => ty,
    }
}

/// `name`, or `name_<n>` if a module of that name already exists. Distinct
/// types can share a struct name, e.g. two aliases with the same name.
fn unique_module_name(ctx: &Context, name: Id) -> Id {
    if !ctx.has_module(name) {
        return name;
    }
    let unique = (1..)
        .map(|n| Id::new(format!("{name}_{n}")))
        .find(|candidate| !ctx.has_module(*candidate))
        .unwrap_or(name);
    log::warn!("Module `{name}' already exists, naming the new gasket `{unique}'");
    unique
}

/// Shares generated encoder and decoder modules between all the places a
/// type is sent or received.
///
/// A cache is bound to the first [Context] it is used with. The lock is held
/// while a module is generated, so concurrent requests for the same type
/// still produce one module.
#[derive(Default)]
pub struct GasketCache {
    state: Mutex<CacheState>,
}

impl GasketCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The schema of `ty`, shared by every user of this cache.
    pub fn schema(&self, ty: &Type) -> Arc<TypeSchema> {
        self.lock().schema(ty)
    }

    /// Name of the encoder module for `ty`, generating it into `ctx` on first
    /// request.
    pub fn encoder_module(&self, ctx: &mut Context, ty: &Type) -> EsiResult<Id> {
        self.lock().module(ctx, ty, Direction::Encode)
    }

    /// Name of the decoder module for `ty`, generating it into `ctx` on first
    /// request.
    pub fn decoder_module(&self, ctx: &mut Context, ty: &Type) -> EsiResult<Id> {
        self.lock().module(ctx, ty, Direction::Decode)
    }

    /// Encode `operand` with an instance of the shared encoder of its type.
    /// Returns the encoded message.
    pub fn build_encoder(
        &self,
        ctx: &mut Context,
        parent: &mut Builder,
        clk: ValueIdx,
        valid: ValueIdx,
        operand: ValueIdx,
    ) -> EsiResult<ValueIdx> {
        check_control(parent, clk, valid)?;
        let ty = parent.ty(operand).clone();
        let name = self.encoder_module(ctx, &ty)?;
        instantiate(ctx, parent, name, Direction::Encode, &self.schema(&ty), &[clk, valid, operand])
    }

    /// Decode the message `operand` into a `ty` with an instance of the
    /// shared decoder of `ty`. Returns the decoded value.
    pub fn build_decoder(
        &self,
        ctx: &mut Context,
        parent: &mut Builder,
        clk: ValueIdx,
        valid: ValueIdx,
        operand: ValueIdx,
        ty: &Type,
    ) -> EsiResult<ValueIdx> {
        check_control(parent, clk, valid)?;
        let schema = self.schema(ty);
        schema.check_supported()?;
        let expected = Type::bit_array(schema.size()?);
        let actual = parent.ty(operand);
        if *actual != expected {
            return Err(Error::shape_mismatch(format!(
                "decoder for `{}' takes `{expected}', got `{actual}'",
                schema.ty()
            )));
        }
        let name = self.decoder_module(ctx, ty)?;
        instantiate(ctx, parent, name, Direction::Decode, &schema, &[clk, valid, operand])
    }
}

fn check_control(parent: &Builder, clk: ValueIdx, valid: ValueIdx) -> EsiResult<()> {
    for (port, value) in [("clk", clk), ("valid", valid)] {
        let ty = parent.ty(value);
        if *ty != Type::i1() {
            return Err(Error::shape_mismatch(format!(
                "`{port}' must be an i1, got `{ty}'"
            )));
        }
    }
    Ok(())
}

fn instantiate(
    ctx: &Context,
    parent: &mut Builder,
    name: Id,
    dir: Direction,
    schema: &TypeSchema,
    inputs: &[ValueIdx],
) -> EsiResult<ValueIdx> {
    let callee: &Module = ctx.get_module(name).ok_or_else(|| {
        Error::malformed_structure(format!("gasket module `{name}' is no longer in the context"))
    })?;
    let inst_name = format!("{}{}Inst", dir.prefix(), schema.name());
    let results = parent.instance_of(callee, inst_name, inputs);
    results.first().copied().ok_or_else(|| {
        Error::malformed_structure(format!("gasket module `{name}' has no outputs"))
    })
}
