use super::*;
use serde_json::json;

#[test]
fn builds_placeholders_in_order() {
    let mut q = Sql::new("SELECT * FROM pages WHERE a = ");
    q.push_bind(1_i64).push(" AND b = ").push_value(json!("x"));

    assert_eq!(q.to_sql(), "SELECT * FROM pages WHERE a = $1 AND b = $2");
    assert_eq!(q.params_ref().len(), 2);
    assert!(q.validate().is_ok());
}

#[test]
fn fragments_renumber_when_composed() {
    let mut a = Sql::empty();
    a.push("x = ").push_bind(1_i64);
    let mut b = Sql::empty();
    b.push("y = ").push_bind(2_i64);

    let mut q = Sql::new("SELECT 1 WHERE ");
    q.push_sql(Sql::join([a, b], " AND "));

    assert_eq!(q.to_sql(), "SELECT 1 WHERE x = $1 AND y = $2");
    assert_eq!(q.param_count(), 2);
}

#[test]
fn join_of_nothing_is_empty() {
    let joined = Sql::join(Vec::<Sql>::new(), ", ");
    assert!(joined.is_empty());
    assert_eq!(joined.to_sql(), "");
}

#[test]
fn idents_are_quoted_inline() {
    let mut q = Sql::new("SELECT ");
    q.push_ident_list(&[
        Ident::column("id").unwrap(),
        Ident::column("title").unwrap(),
    ])
    .push(" FROM ")
    .push_ident_ref(&Ident::table(Some("public"), "pages").unwrap());

    assert_eq!(
        q.to_sql(),
        r#"SELECT "id", "title" FROM "public"."pages""#
    );
}

#[test]
fn ident_after_param_starts_new_part() {
    let mut q = Sql::empty();
    q.push_bind(1_i64).push_ident_ref(&Ident::column("a").unwrap());
    assert_eq!(q.to_sql(), r#"$1"a""#);
}

#[test]
fn trusted_literal_is_pushed_verbatim() {
    let mut q = Sql::new("x ");
    q.push_trusted(TrustedLiteral::new("NOT IN"));
    assert_eq!(q.to_sql(), "x NOT IN");
}

#[test]
fn ten_or_more_params_render_multi_digit() {
    let mut q = Sql::empty();
    for i in 0..11_i64 {
        if i > 0 {
            q.push(",");
        }
        q.push_bind(i);
    }
    assert!(q.to_sql().ends_with("$10,$11"));
}

#[test]
fn where_clause_joins_predicates_with_and() {
    let mut a = Sql::empty();
    a.push("x = ").push_bind(1_i64);
    let mut b = Sql::empty();
    b.push("y IS NULL");

    let mut q = Sql::new("DELETE FROM t");
    q.push_where_and(vec![a, b]);
    assert_eq!(q.to_sql(), "DELETE FROM t WHERE x = $1 AND y IS NULL");

    let mut unfiltered = Sql::new("DELETE FROM t");
    unfiltered.push_where_and(Vec::new());
    assert_eq!(unfiltered.to_sql(), "DELETE FROM t");
}
