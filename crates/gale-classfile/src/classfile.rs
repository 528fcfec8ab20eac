use crate::annotation::{Annotation, ElementValue};
use crate::constant_pool::{ConstantPool, CpInfo};
use crate::error::{Error, Result};
use crate::module::ModuleAttribute;
use crate::reader::Reader;
use crate::type_annotation::TypeAnnotation;

/// The header-relevant shape of a class file.
///
/// Everything a header compiler reads from dependencies or writes into the
/// output jar is represented; `Code`, debug tables, and bootstrap methods are
/// not (the parser skips them).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub signature: Option<String>,
    pub visible_annotations: Vec<Annotation>,
    pub invisible_annotations: Vec<Annotation>,
    pub visible_type_annotations: Vec<TypeAnnotation>,
    pub invisible_type_annotations: Vec<TypeAnnotation>,
    pub inner_classes: Vec<InnerClassInfo>,
    pub record_components: Option<Vec<RecordComponentInfo>>,
    pub module: Option<ModuleAttribute>,
}

impl ClassFile {
    pub fn new(this_class: impl Into<String>) -> Self {
        Self {
            minor_version: 0,
            major_version: crate::EMITTED_MAJOR_VERSION,
            access_flags: 0,
            this_class: this_class.into(),
            super_class: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            signature: None,
            visible_annotations: Vec::new(),
            invisible_annotations: Vec::new(),
            visible_type_annotations: Vec::new(),
            invisible_type_annotations: Vec::new(),
            inner_classes: Vec::new(),
            record_components: None,
            module: None,
        }
    }
}

/// The value of a `ConstantValue` attribute. Booleans, bytes, shorts, and
/// chars are all `Int` on the wire; the field descriptor disambiguates.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub constant_value: Option<ConstantValue>,
    pub visible_annotations: Vec<Annotation>,
    pub invisible_annotations: Vec<Annotation>,
    pub visible_type_annotations: Vec<TypeAnnotation>,
    pub invisible_type_annotations: Vec<TypeAnnotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    /// Internal names from the `Exceptions` attribute.
    pub exceptions: Vec<String>,
    pub annotation_default: Option<ElementValue>,
    pub visible_annotations: Vec<Annotation>,
    pub invisible_annotations: Vec<Annotation>,
    pub visible_parameter_annotations: Vec<Vec<Annotation>>,
    pub invisible_parameter_annotations: Vec<Vec<Annotation>>,
    pub visible_type_annotations: Vec<TypeAnnotation>,
    pub invisible_type_annotations: Vec<TypeAnnotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordComponentInfo {
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub visible_annotations: Vec<Annotation>,
    pub invisible_annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassInfo {
    pub inner_class: String,
    pub outer_class: Option<String>,
    pub inner_name: Option<String>,
    pub access_flags: u16,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.u4()?;
        if magic != 0xCAFEBABE {
            return Err(Error::BadMagic(magic));
        }

        let minor_version = reader.u2()?;
        let major_version = reader.u2()?;
        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.u2()?;
        let this_class = cp.get_class_name(reader.u2()?)?;
        let super_class_idx = reader.u2()?;
        let super_class = if super_class_idx == 0 {
            None
        } else {
            Some(cp.get_class_name(super_class_idx)?)
        };

        let interfaces_count = reader.u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(cp.get_class_name(reader.u2()?)?);
        }

        let fields_count = reader.u2()? as usize;
        let mut fields = Vec::with_capacity(fields_count);
        for _ in 0..fields_count {
            fields.push(parse_field(&mut reader, &cp)?);
        }

        let methods_count = reader.u2()? as usize;
        let mut methods = Vec::with_capacity(methods_count);
        for _ in 0..methods_count {
            methods.push(parse_method(&mut reader, &cp)?);
        }

        let mut class = ClassFile {
            minor_version,
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            signature: None,
            visible_annotations: Vec::new(),
            invisible_annotations: Vec::new(),
            visible_type_annotations: Vec::new(),
            invisible_type_annotations: Vec::new(),
            inner_classes: Vec::new(),
            record_components: None,
            module: None,
        };
        parse_class_attributes(&mut reader, &cp, &mut class)?;
        reader.done()?;
        Ok(class)
    }
}

fn parse_annotation_list(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Vec<Annotation>> {
    let num = reader.u2()? as usize;
    let mut out = Vec::with_capacity(num);
    for _ in 0..num {
        out.push(Annotation::parse(reader, cp)?);
    }
    Ok(out)
}

fn parse_type_annotation_list(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
) -> Result<Vec<TypeAnnotation>> {
    let num = reader.u2()? as usize;
    let mut out = Vec::with_capacity(num);
    for _ in 0..num {
        out.push(TypeAnnotation::parse(reader, cp)?);
    }
    Ok(out)
}

fn parse_parameter_annotations(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
) -> Result<Vec<Vec<Annotation>>> {
    let num_params = reader.u1()? as usize;
    let mut out = Vec::with_capacity(num_params);
    for _ in 0..num_params {
        out.push(parse_annotation_list(reader, cp)?);
    }
    Ok(out)
}

fn parse_field(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<FieldInfo> {
    let access_flags = reader.u2()?;
    let name = cp.get_utf8(reader.u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.u2()?)?.to_string();

    let mut field = FieldInfo {
        access_flags,
        name,
        descriptor,
        signature: None,
        constant_value: None,
        visible_annotations: Vec::new(),
        invisible_annotations: Vec::new(),
        visible_type_annotations: Vec::new(),
        invisible_type_annotations: Vec::new(),
    };

    let attributes_count = reader.u2()? as usize;
    for _ in 0..attributes_count {
        let name_index = reader.u2()?;
        let length = reader.u4()? as usize;
        let mut sub = reader.sub(length)?;
        match cp.get_utf8(name_index)? {
            "Signature" => {
                field.signature = Some(cp.get_utf8(sub.u2()?)?.to_string());
                sub.done()?;
            }
            "ConstantValue" => {
                let idx = sub.u2()?;
                field.constant_value = Some(match cp.get(idx)? {
                    CpInfo::Integer(v) => ConstantValue::Int(*v),
                    CpInfo::Long(v) => ConstantValue::Long(*v),
                    CpInfo::Float(v) => ConstantValue::Float(*v),
                    CpInfo::Double(v) => ConstantValue::Double(*v),
                    CpInfo::String { .. } => ConstantValue::String(cp.get_string_constant(idx)?),
                    _ => return Err(Error::BadAttribute("ConstantValue")),
                });
                sub.done()?;
            }
            "RuntimeVisibleAnnotations" => {
                field.visible_annotations = parse_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            "RuntimeInvisibleAnnotations" => {
                field.invisible_annotations = parse_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            "RuntimeVisibleTypeAnnotations" => {
                field.visible_type_annotations = parse_type_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            "RuntimeInvisibleTypeAnnotations" => {
                field.invisible_type_annotations = parse_type_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            _ => {}
        }
    }

    Ok(field)
}

fn parse_method(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<MethodInfo> {
    let access_flags = reader.u2()?;
    let name = cp.get_utf8(reader.u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.u2()?)?.to_string();

    let mut method = MethodInfo {
        access_flags,
        name,
        descriptor,
        signature: None,
        exceptions: Vec::new(),
        annotation_default: None,
        visible_annotations: Vec::new(),
        invisible_annotations: Vec::new(),
        visible_parameter_annotations: Vec::new(),
        invisible_parameter_annotations: Vec::new(),
        visible_type_annotations: Vec::new(),
        invisible_type_annotations: Vec::new(),
    };

    let attributes_count = reader.u2()? as usize;
    for _ in 0..attributes_count {
        let name_index = reader.u2()?;
        let length = reader.u4()? as usize;
        let mut sub = reader.sub(length)?;
        match cp.get_utf8(name_index)? {
            "Signature" => {
                method.signature = Some(cp.get_utf8(sub.u2()?)?.to_string());
                sub.done()?;
            }
            "Exceptions" => {
                let count = sub.u2()? as usize;
                let mut exceptions = Vec::with_capacity(count);
                for _ in 0..count {
                    exceptions.push(cp.get_class_name(sub.u2()?)?);
                }
                method.exceptions = exceptions;
                sub.done()?;
            }
            "AnnotationDefault" => {
                method.annotation_default = Some(ElementValue::parse(&mut sub, cp)?);
                sub.done()?;
            }
            "RuntimeVisibleAnnotations" => {
                method.visible_annotations = parse_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            "RuntimeInvisibleAnnotations" => {
                method.invisible_annotations = parse_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            "RuntimeVisibleParameterAnnotations" => {
                method.visible_parameter_annotations = parse_parameter_annotations(&mut sub, cp)?;
                sub.done()?;
            }
            "RuntimeInvisibleParameterAnnotations" => {
                method.invisible_parameter_annotations = parse_parameter_annotations(&mut sub, cp)?;
                sub.done()?;
            }
            "RuntimeVisibleTypeAnnotations" => {
                method.visible_type_annotations = parse_type_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            "RuntimeInvisibleTypeAnnotations" => {
                method.invisible_type_annotations = parse_type_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            // Code and debug attributes are irrelevant to headers.
            _ => {}
        }
    }

    Ok(method)
}

fn parse_class_attributes(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
    class: &mut ClassFile,
) -> Result<()> {
    let attributes_count = reader.u2()? as usize;
    for _ in 0..attributes_count {
        let name_index = reader.u2()?;
        let length = reader.u4()? as usize;
        let mut sub = reader.sub(length)?;
        match cp.get_utf8(name_index)? {
            "Signature" => {
                class.signature = Some(cp.get_utf8(sub.u2()?)?.to_string());
                sub.done()?;
            }
            "RuntimeVisibleAnnotations" => {
                class.visible_annotations = parse_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            "RuntimeInvisibleAnnotations" => {
                class.invisible_annotations = parse_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            "RuntimeVisibleTypeAnnotations" => {
                class.visible_type_annotations = parse_type_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            "RuntimeInvisibleTypeAnnotations" => {
                class.invisible_type_annotations = parse_type_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            "InnerClasses" => {
                let num = sub.u2()? as usize;
                let mut inners = Vec::with_capacity(num);
                for _ in 0..num {
                    let inner_class_info_index = sub.u2()?;
                    let outer_class_info_index = sub.u2()?;
                    let inner_name_index = sub.u2()?;
                    let inner_access_flags = sub.u2()?;

                    let inner_class = cp.get_class_name(inner_class_info_index)?;
                    let outer_class = if outer_class_info_index == 0 {
                        None
                    } else {
                        Some(cp.get_class_name(outer_class_info_index)?)
                    };
                    let inner_name = if inner_name_index == 0 {
                        None
                    } else {
                        Some(cp.get_utf8(inner_name_index)?.to_string())
                    };

                    inners.push(InnerClassInfo {
                        inner_class,
                        outer_class,
                        inner_name,
                        access_flags: inner_access_flags,
                    });
                }
                class.inner_classes = inners;
                sub.done()?;
            }
            "Record" => {
                let num = sub.u2()? as usize;
                let mut components = Vec::with_capacity(num);
                for _ in 0..num {
                    components.push(parse_record_component(&mut sub, cp)?);
                }
                class.record_components = Some(components);
                sub.done()?;
            }
            "Module" => {
                class.module = Some(ModuleAttribute::parse(&mut sub, cp)?);
                sub.done()?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_record_component(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
) -> Result<RecordComponentInfo> {
    let name = cp.get_utf8(reader.u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.u2()?)?.to_string();

    let mut component = RecordComponentInfo {
        name,
        descriptor,
        signature: None,
        visible_annotations: Vec::new(),
        invisible_annotations: Vec::new(),
    };

    let attributes_count = reader.u2()? as usize;
    for _ in 0..attributes_count {
        let name_index = reader.u2()?;
        let length = reader.u4()? as usize;
        let mut sub = reader.sub(length)?;
        match cp.get_utf8(name_index)? {
            "Signature" => {
                component.signature = Some(cp.get_utf8(sub.u2()?)?.to_string());
                sub.done()?;
            }
            "RuntimeVisibleAnnotations" => {
                component.visible_annotations = parse_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            "RuntimeInvisibleAnnotations" => {
                component.invisible_annotations = parse_annotation_list(&mut sub, cp)?;
                sub.done()?;
            }
            _ => {}
        }
    }

    Ok(component)
}
