//! Generation of Cap'n Proto decoders.
//!
//! The decoder slices fields straight out of the encoded message. Whatever it
//! cannot check statically about the message, it checks with assertions that
//! fire on the rising clock edge while `valid` is high: the root pointer must
//! describe the expected struct and every list pointer the expected list.
use crate::compiler::{CapnpType, EMPTY_STRUCT_OFFSET, Field, WirePointerKind};
use crate::gasket::{AssertBuilder, Component, Gasket, Slice};
use crate::schema::TypeSchema;
use esi_ir::{Bits, FieldInfo, ICmpPredicate, Module, PortInfo, Type};
use esi_utils::{Error, EsiResult};

/// Name of the decoder module generated for `schema`.
pub fn decoder_name(schema: &TypeSchema) -> String {
    format!("decode{}", schema.name())
}

/// Build `decode<Name>(clk, valid, encodedInput) -> (decoded)`.
pub fn build_decoder(schema: &TypeSchema) -> EsiResult<Module> {
    schema.check_supported()?;
    let node = schema.type_schema()?;
    let size = schema.size()?;
    let mut module = Module::new(
        decoder_name(schema),
        vec![
            PortInfo::input("clk", Type::i1()),
            PortInfo::input("valid", Type::i1()),
            PortInfo::input("encodedInput", Type::bit_array(size)),
            PortInfo::output("decoded", schema.ty().clone()),
        ],
    );

    {
        let mut g = Gasket::new(&mut module);
        let (clk, valid) = (g.arg("clk"), g.arg("valid"));
        let input = g.arg("encodedInput");
        let operand = g.root(input);
        let asserts = AssertBuilder::new(&mut g, clk, valid);

        // Only canonical messages are accepted: the root struct must directly
        // follow its pointer, and an empty root struct sits at offset -1.
        let ptr = g.slice(operand, 0, 64);
        let ptr = g.name(ptr, "rootPointer");
        let type_and_offset = g.slice(ptr, 0, 32);
        let type_and_offset = g.name(type_and_offset, "typeAndOffset");
        let expected = if node.is_empty() {
            EMPTY_STRUCT_OFFSET << 2 | WirePointerKind::Struct.tag()
        } else {
            WirePointerKind::Struct.tag()
        };
        asserts.assert_eq(&mut g, type_and_offset, expected, "typeAndOffset");

        let data_words = g.slice(ptr, 32, 16);
        let data_words = g.cast(data_words, Type::int(16));
        let data_words = g.name(data_words, "dataSectionSize");
        asserts.assert_eq(&mut g, data_words, node.data_word_count, "dataSectionSize");

        let ptr_words = g.slice(ptr, 48, 16);
        let ptr_words = g.cast(ptr_words, Type::int(16));
        let ptr_words = g.name(ptr_words, "ptrSectionSize");
        asserts.assert_eq(&mut g, ptr_words, node.pointer_count, "ptrSectionSize");

        let data_section = (node.data_word_count > 0).then(|| {
            let s = g.slice(operand, 64, node.data_word_count * 64);
            g.name(s, "dataSection")
        });
        let ptr_section = (node.pointer_count > 0).then(|| {
            let s = g.slice(
                operand,
                64 + node.data_word_count * 64,
                node.pointer_count * 64,
            );
            g.name(s, "ptrSection")
        });

        let mut decoder = FieldDecoder {
            g: &mut g,
            asserts,
            data_section,
            ptr_section,
        };
        let mut values = Vec::with_capacity(node.fields.len());
        for field in &node.fields {
            let hw = &schema.fields()[field.code_order];
            values.push(decoder.decode_field(hw, field)?);
        }

        let decoded = match schema.canonical() {
            Type::Struct(_) => {
                let raw: Vec<_> = values.iter().map(|v| v.value()).collect();
                Component(g.b.struct_create(schema.ty().clone(), &raw))
            }
            _ => g.cast(values[0], schema.ty().clone()),
        };
        g.b.output(&[decoded.value()]);
    }

    log::debug!(
        "Generated decoder `{}' for `{}' ({size} bit messages)",
        module.name,
        schema.ty()
    );
    Ok(module)
}

struct FieldDecoder<'g, 'a> {
    g: &'g mut Gasket<'a>,
    asserts: AssertBuilder,
    data_section: Option<Slice>,
    ptr_section: Option<Slice>,
}

impl FieldDecoder<'_, '_> {
    /// Decode the struct field `field` into a value of the type of `hw`.
    fn decode_field(&mut self, hw: &FieldInfo, field: &Field) -> EsiResult<Component> {
        let value = match &field.ty {
            CapnpType::Void => Component(self.g.b.constant(hw.ty.clone(), Bits::zero(0))),
            CapnpType::List(elem) => {
                let list = self.decode_list(&hw.ty, field, elem)?;
                self.g.cast(list, hw.ty.clone())
            }
            _ => {
                let section = self.data_section.ok_or_else(|| {
                    Error::internal_schema(format!(
                        "field `{}' has no data section to live in",
                        field.name
                    ))
                })?;
                let width = hw.ty.bit_width();
                let bits = self.g.slice(section, field.bit_offset(), width);
                let bits = self.g.name_field(bits, field.name, "_bits");
                self.g.cast(bits, hw.ty.clone())
            }
        };
        Ok(self.g.name_field(value, field.name, "Value"))
    }

    /// Decode the list field `field` holding a `ty` array. The result has the
    /// canonical array type.
    fn decode_list(
        &mut self,
        ty: &Type,
        field: &Field,
        elem: &CapnpType,
    ) -> EsiResult<Component> {
        let (hw_elem, len) = ty
            .as_array()
            .map(|(e, n)| (e.clone(), n))
            .ok_or_else(|| {
                Error::internal_schema(format!(
                    "list field `{}' does not hold an array",
                    field.name
                ))
            })?;
        let section = self.ptr_section.ok_or_else(|| {
            Error::internal_schema(format!(
                "field `{}' has no pointer section to live in",
                field.name
            ))
        })?;
        let g = &mut *self.g;
        let name = field.name;

        let ptr = g.slice(section, field.bit_offset(), 64);
        let ptr = g.name_field(ptr, name, "_ptr");
        let tag = g.slice(ptr, 0, 2);
        let offset = g.slice(ptr, 2, 30);
        let offset = g.cast(offset, Type::int(30));
        let offset = g.name_field(offset, name, "_offset");
        let elem_size = g.slice(ptr, 32, 3);
        let length = g.slice(ptr, 35, 29);

        self.asserts.assert_eq(
            g,
            tag,
            WirePointerKind::List.tag(),
            &format!("{name}: list pointer tag"),
        );
        self.asserts.assert_eq(
            g,
            elem_size,
            elem.element_size().code(),
            &format!("{name}: element size"),
        );
        self.asserts.assert_pred(
            g,
            length,
            ICmpPredicate::Ule,
            len,
            &format!("{name}: list length"),
        );

        let elem_bits = elem.bits();
        if elem_bits == 0 {
            return Ok(Component(
                g.b.constant(ty.canonical().clone(), Bits::zero(0)),
            ));
        }

        // The payload starts `offset` words after the end of the pointer.
        let msg = g.root_slice(ptr);
        let ptr_offset = g.offset_from_root(ptr).ok_or_else(|| {
            Error::internal_schema(format!(
                "offset of the `{name}' pointer is not known"
            ))
        })?;
        let word_bits = g.zero(6);
        let scaled = Component(g.b.concat(&[offset.value(), word_bits.value()]));
        let base = g.constant(36, ptr_offset + 64);
        let list_offset = Component(g.b.add(scaled.value(), base.value()));
        let list_offset = g.name_field(list_offset, name, "_listOffset");
        let payload = g.slice_dyn(msg, list_offset, len * elem_bits);
        let elems = g.cast_to_slice(payload, Type::int(elem_bits), len);
        if g.ty(elems) == ty.canonical() {
            return Ok(g.component(elems));
        }

        let values: Vec<_> = (0..len)
            .map(|k| {
                let capnp_elem = g.get(elems, k);
                let capnp_elem = g.name_field(capnp_elem, name, "_capnp_elem");
                let hw_value = g.downcast(capnp_elem, &hw_elem);
                g.name_field(hw_value, name, "_elem").value()
            })
            .collect();
        Ok(Component(g.b.array_create(&values)))
    }
}
