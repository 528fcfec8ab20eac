//! Serialization of [`ClassFile`] values back to bytes.
//!
//! The constant pool is built on the fly while the class body is serialized
//! into a side buffer, then the two are concatenated. Pool entries are
//! interned, so re-emitting a parsed class produces an equivalent structure
//! (pool ordering aside).

use crate::annotation::{Annotation, ElementValue};
use crate::classfile::{
    ClassFile, ConstantValue, FieldInfo, InnerClassInfo, MethodInfo, RecordComponentInfo,
};
use crate::constant_pool::ConstantPoolBuilder;
use crate::error::Result;
use crate::type_annotation::TypeAnnotation;
use crate::writer::Writer;

impl ClassFile {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut pool = ConstantPoolBuilder::new();
        let mut body = Writer::new();

        body.write_u2(self.access_flags);
        body.write_u2(pool.class_info(&self.this_class)?);
        match &self.super_class {
            None => body.write_u2(0),
            Some(name) => body.write_u2(pool.class_info(name)?),
        }
        body.write_u2(self.interfaces.len() as u16);
        for iface in &self.interfaces {
            body.write_u2(pool.class_info(iface)?);
        }

        body.write_u2(self.fields.len() as u16);
        for field in &self.fields {
            write_field(&mut body, &mut pool, field)?;
        }

        body.write_u2(self.methods.len() as u16);
        for method in &self.methods {
            write_method(&mut body, &mut pool, method)?;
        }

        let mut attrs = Attributes::default();
        if let Some(sig) = &self.signature {
            attrs.signature(&mut pool, sig)?;
        }
        attrs.annotations(&mut pool, "RuntimeVisibleAnnotations", &self.visible_annotations)?;
        attrs.annotations(
            &mut pool,
            "RuntimeInvisibleAnnotations",
            &self.invisible_annotations,
        )?;
        attrs.type_annotations(
            &mut pool,
            "RuntimeVisibleTypeAnnotations",
            &self.visible_type_annotations,
        )?;
        attrs.type_annotations(
            &mut pool,
            "RuntimeInvisibleTypeAnnotations",
            &self.invisible_type_annotations,
        )?;
        if !self.inner_classes.is_empty() {
            attrs.inner_classes(&mut pool, &self.inner_classes)?;
        }
        if let Some(components) = &self.record_components {
            attrs.record(&mut pool, components)?;
        }
        if let Some(module) = &self.module {
            let mut content = Writer::new();
            module.write(&mut content, &mut pool)?;
            attrs.raw(&mut pool, "Module", content)?;
        }
        attrs.write_to(&mut body);

        let mut out = Writer::new();
        out.write_u4(0xCAFEBABE);
        out.write_u2(self.minor_version);
        out.write_u2(self.major_version);
        pool.write_to(&mut out);
        out.write_bytes(body.as_slice());
        Ok(out.into_bytes())
    }
}

fn write_field(w: &mut Writer, pool: &mut ConstantPoolBuilder, field: &FieldInfo) -> Result<()> {
    w.write_u2(field.access_flags);
    w.write_u2(pool.utf8(&field.name)?);
    w.write_u2(pool.utf8(&field.descriptor)?);

    let mut attrs = Attributes::default();
    if let Some(value) = &field.constant_value {
        let index = match value {
            ConstantValue::Int(v) => pool.integer(*v)?,
            ConstantValue::Long(v) => pool.long(*v)?,
            ConstantValue::Float(v) => pool.float(*v)?,
            ConstantValue::Double(v) => pool.double(*v)?,
            ConstantValue::String(v) => pool.string(v)?,
        };
        let mut content = Writer::new();
        content.write_u2(index);
        attrs.raw(pool, "ConstantValue", content)?;
    }
    if let Some(sig) = &field.signature {
        attrs.signature(pool, sig)?;
    }
    attrs.annotations(pool, "RuntimeVisibleAnnotations", &field.visible_annotations)?;
    attrs.annotations(
        pool,
        "RuntimeInvisibleAnnotations",
        &field.invisible_annotations,
    )?;
    attrs.type_annotations(
        pool,
        "RuntimeVisibleTypeAnnotations",
        &field.visible_type_annotations,
    )?;
    attrs.type_annotations(
        pool,
        "RuntimeInvisibleTypeAnnotations",
        &field.invisible_type_annotations,
    )?;
    attrs.write_to(w);
    Ok(())
}

fn write_method(w: &mut Writer, pool: &mut ConstantPoolBuilder, method: &MethodInfo) -> Result<()> {
    w.write_u2(method.access_flags);
    w.write_u2(pool.utf8(&method.name)?);
    w.write_u2(pool.utf8(&method.descriptor)?);

    let mut attrs = Attributes::default();
    if !method.exceptions.is_empty() {
        let mut content = Writer::new();
        content.write_u2(method.exceptions.len() as u16);
        for exception in &method.exceptions {
            content.write_u2(pool.class_info(exception)?);
        }
        attrs.raw(pool, "Exceptions", content)?;
    }
    if let Some(sig) = &method.signature {
        attrs.signature(pool, sig)?;
    }
    if let Some(default) = &method.annotation_default {
        let mut content = Writer::new();
        default.write(&mut content, pool)?;
        attrs.raw(pool, "AnnotationDefault", content)?;
    }
    attrs.annotations(pool, "RuntimeVisibleAnnotations", &method.visible_annotations)?;
    attrs.annotations(
        pool,
        "RuntimeInvisibleAnnotations",
        &method.invisible_annotations,
    )?;
    attrs.parameter_annotations(
        pool,
        "RuntimeVisibleParameterAnnotations",
        &method.visible_parameter_annotations,
    )?;
    attrs.parameter_annotations(
        pool,
        "RuntimeInvisibleParameterAnnotations",
        &method.invisible_parameter_annotations,
    )?;
    attrs.type_annotations(
        pool,
        "RuntimeVisibleTypeAnnotations",
        &method.visible_type_annotations,
    )?;
    attrs.type_annotations(
        pool,
        "RuntimeInvisibleTypeAnnotations",
        &method.invisible_type_annotations,
    )?;
    attrs.write_to(w);
    Ok(())
}

fn write_record_component(
    w: &mut Writer,
    pool: &mut ConstantPoolBuilder,
    component: &RecordComponentInfo,
) -> Result<()> {
    w.write_u2(pool.utf8(&component.name)?);
    w.write_u2(pool.utf8(&component.descriptor)?);

    let mut attrs = Attributes::default();
    if let Some(sig) = &component.signature {
        attrs.signature(pool, sig)?;
    }
    attrs.annotations(
        pool,
        "RuntimeVisibleAnnotations",
        &component.visible_annotations,
    )?;
    attrs.annotations(
        pool,
        "RuntimeInvisibleAnnotations",
        &component.invisible_annotations,
    )?;
    attrs.write_to(w);
    Ok(())
}

/// Accumulates serialized attributes so the `attributes_count` prefix can be
/// written before the attribute bodies.
#[derive(Default)]
struct Attributes {
    items: Vec<(u16, Writer)>,
}

impl Attributes {
    fn raw(&mut self, pool: &mut ConstantPoolBuilder, name: &str, content: Writer) -> Result<()> {
        let name_index = pool.utf8(name)?;
        self.items.push((name_index, content));
        Ok(())
    }

    fn signature(&mut self, pool: &mut ConstantPoolBuilder, sig: &str) -> Result<()> {
        let mut content = Writer::new();
        content.write_u2(pool.utf8(sig)?);
        self.raw(pool, "Signature", content)
    }

    fn annotations(
        &mut self,
        pool: &mut ConstantPoolBuilder,
        name: &str,
        annotations: &[Annotation],
    ) -> Result<()> {
        if annotations.is_empty() {
            return Ok(());
        }
        let mut content = Writer::new();
        content.write_u2(annotations.len() as u16);
        for annotation in annotations {
            annotation.write(&mut content, pool)?;
        }
        self.raw(pool, name, content)
    }

    fn parameter_annotations(
        &mut self,
        pool: &mut ConstantPoolBuilder,
        name: &str,
        params: &[Vec<Annotation>],
    ) -> Result<()> {
        if params.iter().all(Vec::is_empty) {
            return Ok(());
        }
        let mut content = Writer::new();
        content.write_u1(params.len() as u8);
        for annotations in params {
            content.write_u2(annotations.len() as u16);
            for annotation in annotations {
                annotation.write(&mut content, pool)?;
            }
        }
        self.raw(pool, name, content)
    }

    fn type_annotations(
        &mut self,
        pool: &mut ConstantPoolBuilder,
        name: &str,
        annotations: &[TypeAnnotation],
    ) -> Result<()> {
        if annotations.is_empty() {
            return Ok(());
        }
        let mut content = Writer::new();
        content.write_u2(annotations.len() as u16);
        for annotation in annotations {
            annotation.write(&mut content, pool)?;
        }
        self.raw(pool, name, content)
    }

    fn inner_classes(
        &mut self,
        pool: &mut ConstantPoolBuilder,
        inners: &[InnerClassInfo],
    ) -> Result<()> {
        let mut content = Writer::new();
        content.write_u2(inners.len() as u16);
        for inner in inners {
            content.write_u2(pool.class_info(&inner.inner_class)?);
            match &inner.outer_class {
                None => content.write_u2(0),
                Some(name) => content.write_u2(pool.class_info(name)?),
            }
            match &inner.inner_name {
                None => content.write_u2(0),
                Some(name) => content.write_u2(pool.utf8(name)?),
            }
            content.write_u2(inner.access_flags);
        }
        self.raw(pool, "InnerClasses", content)
    }

    fn record(
        &mut self,
        pool: &mut ConstantPoolBuilder,
        components: &[RecordComponentInfo],
    ) -> Result<()> {
        let mut content = Writer::new();
        content.write_u2(components.len() as u16);
        for component in components {
            write_record_component(&mut content, pool, component)?;
        }
        self.raw(pool, "Record", content)
    }

    fn write_to(self, w: &mut Writer) {
        w.write_u2(self.items.len() as u16);
        for (name_index, content) in self.items {
            w.write_u2(name_index);
            w.write_u4(content.len() as u32);
            w.write_bytes(content.as_slice());
        }
    }
}

/// `AnnotationDefault` values are written standalone in tests; keep the
/// helper visible to the crate.
#[allow(unused)]
pub(crate) fn write_element_value(
    value: &ElementValue,
    pool: &mut ConstantPoolBuilder,
) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    value.write(&mut w, pool)?;
    Ok(w.into_bytes())
}
