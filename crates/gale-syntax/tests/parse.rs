use gale_syntax::tree::*;
use gale_syntax::{parse_compilation_unit, parse_source};
use pretty_assertions::assert_eq;

#[test]
fn package_imports_and_class() {
    let unit = parse_compilation_unit(
        r#"
package a.b;

import java.util.List;
import java.util.*;
import static java.lang.Math.PI;

public final class C extends D implements E, F {}
"#,
    )
    .unwrap();

    assert_eq!(unit.package.as_ref().unwrap().name, vec!["a", "b"]);
    assert_eq!(unit.imports.len(), 3);
    assert!(!unit.imports[0].wildcard);
    assert!(unit.imports[1].wildcard);
    assert!(unit.imports[2].is_static);

    let decl = &unit.types[0];
    assert_eq!(decl.kind, TyKind::Class);
    assert_eq!(decl.name, "C");
    assert!(decl.mods.contains(Modifiers::PUBLIC));
    assert!(decl.mods.contains(Modifiers::FINAL));
    assert_eq!(decl.extends.as_ref().unwrap().dotted(), "D");
    assert_eq!(decl.implements.len(), 2);
}

#[test]
fn nested_classes_and_supertypes() {
    let unit = parse_compilation_unit(
        "package a; public class A { public class Inner1 extends b.B {} public class Inner2 extends A.Inner1 {} }",
    )
    .unwrap();
    let a = &unit.types[0];
    assert_eq!(a.members.len(), 2);
    match (&a.members[0], &a.members[1]) {
        (Member::Type(inner1), Member::Type(inner2)) => {
            assert_eq!(inner1.extends.as_ref().unwrap().dotted(), "b.B");
            assert_eq!(inner2.extends.as_ref().unwrap().dotted(), "A.Inner1");
        }
        other => panic!("unexpected members: {other:?}"),
    }
}

#[test]
fn fields_methods_and_bodies_are_skipped() {
    let unit = parse_compilation_unit(
        r#"
class C {
    static final int X = 1 + 2, Y = X * 3;
    private String s = compute();
    <T extends Comparable<T>> T max(T a, T b) throws E1, E2 { return a; }
    C() { this.s = null; }
    static { System.out.println(); }
}
"#,
    )
    .unwrap();

    let c = &unit.types[0];
    let fields: Vec<_> = c
        .members
        .iter()
        .filter_map(|m| match m {
            Member::Field(f) => Some(f),
            _ => None,
        })
        .collect();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0].name, "X");
    assert!(fields[0].init.is_some());
    assert_eq!(fields[1].name, "Y");
    // Non-constant initializers are dropped, not errors.
    assert_eq!(fields[2].name, "s");
    assert!(fields[2].init.is_none());

    let methods: Vec<_> = c
        .members
        .iter()
        .filter_map(|m| match m {
            Member::Method(m) => Some(m),
            _ => None,
        })
        .collect();
    assert_eq!(methods.len(), 2);
    assert_eq!(methods[0].name, "max");
    assert_eq!(methods[0].type_params.len(), 1);
    assert_eq!(methods[0].throws.len(), 2);
    assert!(methods[1].is_constructor);
}

#[test]
fn generic_types_with_nested_angles() {
    let unit =
        parse_compilation_unit("class C { java.util.Map<String, java.util.List<Integer>> m; }")
            .unwrap();
    let Member::Field(field) = &unit.types[0].members[0] else {
        panic!()
    };
    let TypeRef::Named(named) = &field.ty else { panic!() };
    assert_eq!(named.segments.len(), 3);
    assert_eq!(named.segments[2].type_args.len(), 2);
}

#[test]
fn enum_with_constant_arguments_and_bodies() {
    let unit = parse_compilation_unit(
        r#"
public enum E implements Marker {
    A,
    B(1, "two") {
        void f() {}
    },
    @Deprecated C;

    final int x = 0;
    E() {}
    E(int a, String b) {}
}
"#,
    )
    .unwrap();
    let e = &unit.types[0];
    assert_eq!(e.kind, TyKind::Enum);
    let names: Vec<_> = e.enum_constants.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(e.enum_constants[2].annotations.len(), 1);
}

#[test]
fn annotation_declaration_with_defaults() {
    let unit = parse_compilation_unit(
        r#"
@Retention(RetentionPolicy.RUNTIME)
@Target({ElementType.TYPE, ElementType.TYPE_USE})
public @interface A {
    int value() default 42;
    String[] names() default {};
    Class<?> type() default Object.class;
}
"#,
    )
    .unwrap();
    let a = &unit.types[0];
    assert_eq!(a.kind, TyKind::Annotation);
    assert_eq!(a.annotations.len(), 2);
    let Member::Method(value) = &a.members[0] else { panic!() };
    assert!(matches!(
        value.default_value,
        Some(Expr::Literal {
            value: Lit::Int(42),
            ..
        })
    ));
    let Member::Method(ty) = &a.members[2] else { panic!() };
    assert!(matches!(ty.default_value, Some(Expr::ClassLit { .. })));
}

#[test]
fn record_components() {
    let unit = parse_compilation_unit(
        "public record Point(int x, @Deprecated int y) implements P { Point { } static int Z = 1; }",
    )
    .unwrap();
    let point = &unit.types[0];
    assert_eq!(point.kind, TyKind::Record);
    assert_eq!(point.components.len(), 2);
    assert_eq!(point.components[1].annotations.len(), 1);
    assert_eq!(point.members.len(), 1);
}

#[test]
fn constant_expressions() {
    let unit = parse_compilation_unit(
        r#"
class C {
    static final int A = 1 << 10 | 2;
    static final long B = (long) A * -3L;
    static final boolean D = true == 42;
    static final String S = "a" + "b";
    static final int T = A > 0 ? A : -A;
}
"#,
    )
    .unwrap();
    let fields: Vec<_> = unit.types[0]
        .members
        .iter()
        .filter_map(|m| match m {
            Member::Field(f) => f.init.as_ref(),
            _ => None,
        })
        .collect();
    assert_eq!(fields.len(), 5);
    assert!(matches!(
        fields[1],
        Expr::Binary {
            op: BinOp::Mul,
            ..
        }
    ));
    assert!(matches!(fields[4], Expr::Conditional { .. }));
}

#[test]
fn varargs_and_array_dims() {
    let unit =
        parse_compilation_unit("class C { void f(int a[], String... rest) {} int[] g()[] { return null; } }")
            .unwrap();
    let Member::Method(f) = &unit.types[0].members[0] else { panic!() };
    assert!(f.varargs);
    assert!(matches!(f.params[0].ty, TypeRef::Array { .. }));
    assert!(matches!(f.params[1].ty, TypeRef::Array { .. }));
    let Member::Method(g) = &unit.types[0].members[1] else { panic!() };
    // `int[] g()[]` is an int[][] return.
    let TypeRef::Array { elem, .. } = &g.return_ty else { panic!() };
    assert!(matches!(**elem, TypeRef::Array { .. }));
}

#[test]
fn module_info() {
    let unit = parse_compilation_unit(
        r#"
module com.example.app {
    requires java.sql;
    requires transitive java.xml;
    exports com.example.api to com.example.other;
    opens com.example.impl;
    uses com.example.spi.Service;
    provides com.example.spi.Service with com.example.impl.ServiceImpl;
}
"#,
    )
    .unwrap();
    let module = unit.module.unwrap();
    assert_eq!(module.name, vec!["com", "example", "app"]);
    assert_eq!(module.directives.len(), 6);
    assert!(matches!(
        &module.directives[1],
        ModDirective::Requires {
            transitive: true,
            ..
        }
    ));
}

#[test]
fn unresolved_imports_still_parse() {
    let unit = parse_compilation_unit("import no.such.Class; class T {}").unwrap();
    assert_eq!(unit.imports[0].name, vec!["no", "such", "Class"]);
}

#[test]
fn syntax_error_carries_position() {
    let err = parse_source("p/T.java", "class T {\n  int = 3;\n}\n").unwrap_err();
    assert_eq!(err.line, 2);
    assert!(err.to_string().contains("p/T.java:2: error:"));
    assert!(err.snippet.is_some());
}

#[test]
fn type_annotations_on_types() {
    let unit = parse_compilation_unit(
        "class C { java.util.List<@Nullable String> xs; int @Tag [] ys; }",
    )
    .unwrap();
    let Member::Field(xs) = &unit.types[0].members[0] else { panic!() };
    let TypeRef::Named(named) = &xs.ty else { panic!() };
    let TypeArg::Ty(TypeRef::Named(arg)) = &named.segments[2].type_args[0] else {
        panic!()
    };
    assert_eq!(arg.segments[0].annotations.len(), 1);
    let Member::Field(ys) = &unit.types[0].members[1] else { panic!() };
    let TypeRef::Array { annotations, .. } = &ys.ty else { panic!() };
    assert_eq!(annotations.len(), 1);
}
