//! Generation of Cap'n Proto encoders.
//!
//! The encoder lays a message out exactly as a canonical Cap'n Proto writer
//! would: the root struct pointer in word 0, the data and pointer sections of
//! the root struct right behind it, then one payload per list field in field
//! order. See <https://capnproto.org/encoding.html>.
use crate::compiler::{CapnpType, EMPTY_STRUCT_OFFSET, StructNode, WirePointerKind};
use crate::gasket::{Component, Gasket};
use crate::schema::TypeSchema;
use crate::segment::Segment;
use esi_ir::{Module, PortInfo, Type};
use esi_utils::{EsiResult, words_for_bits};

/// Name of the encoder module generated for `schema`.
pub fn encoder_name(schema: &TypeSchema) -> String {
    format!("encode{}", schema.name())
}

/// Build `encode<Name>(clk, valid, unencodedInput) -> (encoded)`.
///
/// Encoding is combinational: `clk` and `valid` are passed in so that every
/// gasket has the same interface, but are not used.
pub fn build_encoder(schema: &TypeSchema) -> EsiResult<Module> {
    schema.check_supported()?;
    let node = schema.type_schema()?;
    let size = schema.size()?;
    let mut module = Module::new(
        encoder_name(schema),
        vec![
            PortInfo::input("clk", Type::i1()),
            PortInfo::input("valid", Type::i1()),
            PortInfo::input("unencodedInput", schema.ty().clone()),
            PortInfo::output("encoded", Type::bit_array(size)),
        ],
    );

    {
        let mut g = Gasket::new(&mut module);
        let operand = g.arg("unencodedInput");
        let field_values: Vec<Component> = match schema.canonical() {
            Type::Struct(fields) => fields
                .iter()
                .map(|f| {
                    let v = Component(g.b.struct_extract(operand.value(), f.name));
                    g.name(v, f.name)
                })
                .collect(),
            _ => vec![operand],
        };
        let encoded = SegmentEncoder {
            g: &mut g,
            seg: Segment::new(size),
        }
        .build(node, &field_values);
        g.b.output(&[encoded.value()]);
    }

    log::debug!(
        "Generated encoder `{}' for `{}' ({size} bit messages)",
        module.name,
        schema.ty()
    );
    Ok(module)
}

/// Places field values into a [Segment].
struct SegmentEncoder<'g, 'a> {
    g: &'g mut Gasket<'a>,
    seg: Segment,
}

impl SegmentEncoder<'_, '_> {
    fn build(&mut self, node: &StructNode, values: &[Component]) -> Component {
        let root = self.seg.alloc(64);
        debug_assert_eq!(root, 0);
        let ptr = self.encode_struct_at(root, node, values);
        self.seg.insert(self.g, root, ptr);
        self.seg.compile(self.g)
    }

    /// Allocate the sections of `node` and fill them with `values`. Returns
    /// the struct pointer to store at `ptr_loc`.
    fn encode_struct_at(
        &mut self,
        ptr_loc: u64,
        node: &StructNode,
        values: &[Component],
    ) -> Component {
        let data = self
            .seg
            .alloc((node.data_word_count + node.pointer_count) * 64);
        let ptrs = data + node.data_word_count * 64;
        // relative to the end of the pointer; an empty struct points at its
        // own pointer
        let rel = if node.is_empty() {
            EMPTY_STRUCT_OFFSET
        } else {
            (data - ptr_loc) / 64 - 1
        };
        let fields = [
            self.g.constant(2, WirePointerKind::Struct.tag()),
            self.g.constant(30, rel),
            self.g.constant(16, node.data_word_count),
            self.g.constant(16, node.pointer_count),
        ];
        let ptr = self.g.concat(&fields);

        for field in &node.fields {
            let base = if field.ty.is_pointer() { ptrs } else { data };
            self.encode_field_at(
                base + field.bit_offset(),
                values[field.code_order],
                &field.ty,
            );
        }
        self.g.name(ptr, "structPointer")
    }

    fn encode_field_at(&mut self, offset: u64, value: Component, ty: &CapnpType) {
        match ty {
            CapnpType::Void => {}
            CapnpType::List(elem) => {
                let len = self
                    .g
                    .ty(value)
                    .as_array()
                    .map(|(_, n)| n)
                    .unwrap_or_else(|| panic!("List field holds a non-array"));
                let list = self.build_list(value, elem, len);
                let rel = (list - offset - 64) / 64;
                let fields = [
                    self.g.constant(2, WirePointerKind::List.tag()),
                    self.g.constant(30, rel),
                    self.g.constant(3, elem.element_size().code()),
                    self.g.constant(29, len),
                ];
                let ptr = self.g.concat(&fields);
                self.seg.insert(self.g, offset, ptr);
            }
            _ => {
                let signed = self.g.ty(value).is_signed();
                let width = self.g.width(value);
                let mut bits = self.g.cast(value, Type::int(width));
                if signed {
                    bits = self.g.sign_extend(bits, ty.bits());
                }
                self.seg.insert(self.g, offset, bits);
            }
        }
    }

    /// Allocate the payload of a list and fill it. Returns its offset.
    fn build_list(&mut self, value: Component, elem: &CapnpType, len: u64) -> u64 {
        let elem_bits = elem.bits();
        let list = self.seg.alloc(words_for_bits(elem_bits * len) * 64);
        let arr = self.g.root(value);
        for k in (0..len).rev() {
            let v = self.g.get(arr, k);
            self.encode_field_at(list + k * elem_bits, v, elem);
        }
        list
    }
}
