use proc_macro_error::abort;
use quote::ToTokens;
use syn::{Attribute, Data, DataStruct, DeriveInput, Expr, Ident, Lit, Type};

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub ident: Ident,   // Column rust name
    pub ty: Type,       // Column rust type
    pub ty_str: String, // Column rust type without spaces, use for generate sql type
    pub length: Option<usize>,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
    pub default: Option<String>, // Sql literal
    pub is_unique: bool,
}

impl ColumnInfo {
    pub fn name(&self) -> String {
        self.ident.to_string()
    }
}

#[derive(Debug)]
pub struct TableInfo {
    pub struct_name: Ident,
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: ColumnInfo,
    pub indexes: Vec<Vec<String>>,
}

#[derive(Debug)]
enum AttrInfo {
    TableName(String),
    PrimaryKey,
    Length(usize),
    AutoIncrement,
    Index(Vec<String>),
    Default(String),
    Unique,
}

pub fn parse(input: DeriveInput) -> TableInfo {
    let st = match &input.data {
        Data::Struct(st) => st,
        _ => abort!(input, "Entity must be a struct"),
    };

    if !input.generics.params.is_empty() {
        abort!(input.generics, "Entity must not be generic");
    }

    let struct_name = input.ident.clone();
    let mut table_name = struct_name.to_string();
    let mut indexes = Vec::<Vec<String>>::new();

    // Parse struct attrs
    for attr in input.attrs.iter().filter(|attr| is_xrepo_attr(attr)) {
        for attr_info in parse_xrepo_attr(attr) {
            match attr_info {
                AttrInfo::TableName(name) => table_name = name,
                AttrInfo::Index(cols) => {
                    if cols.is_empty() {
                        abort!(attr, "Empty columns");
                    }

                    indexes.push(cols);
                }
                _ => abort!(attr, "Invalid struct attr field: {:?}", attr_info),
            }
        }
    }

    // Parse columns
    let columns = parse_columns(st);

    // Exactly one primary key
    let mut primary_keys = columns.iter().filter(|col| col.is_primary_key);
    let primary_key = match (primary_keys.next(), primary_keys.next()) {
        (Some(pk), None) => pk.clone(),
        (None, _) => abort!(input.ident, "Entity requires a #[xrepo(primary_key)] field"),
        (Some(_), Some(second)) => abort!(second.ident, "Entity supports a single primary key"),
    };

    // Index columns must exist
    for index in &indexes {
        for col in index {
            if !columns.iter().any(|c| &c.name() == col) {
                abort!(input.ident, "Index column '{}' not found", col);
            }
        }
    }

    TableInfo {
        struct_name,
        table_name,
        columns,
        primary_key,
        indexes,
    }
}

const INTEGER_TYPES: &[&str] = &["i8", "u8", "i16", "u16", "i32", "u32", "i64", "u64"];

fn parse_columns(st: &DataStruct) -> Vec<ColumnInfo> {
    let mut columns = Vec::<ColumnInfo>::new();

    for field in &st.fields {
        // Generate name and type
        let ident = if let Some(ident) = &field.ident {
            ident.clone()
        } else {
            abort!(field, "Field must be named");
        };
        let ty_str = field.ty.to_token_stream().to_string().replace(' ', "");
        let mut length = None;
        let mut is_primary_key = false;
        let mut is_auto_increment = false;
        let mut default = Option::<String>::None;
        let mut is_unique = false;

        // Parse attr
        for attr in field.attrs.iter().filter(|attr| is_xrepo_attr(attr)) {
            for attr_info in parse_xrepo_attr(attr) {
                match attr_info {
                    AttrInfo::PrimaryKey => is_primary_key = true,
                    AttrInfo::Length(len) => length = Some(len),
                    AttrInfo::AutoIncrement => is_auto_increment = true,
                    AttrInfo::Default(def) => default = Some(def),
                    AttrInfo::Unique => is_unique = true,
                    _ => abort!(attr, "Invalid column attr field: {:?}", attr_info),
                }
            }
        }

        if is_auto_increment && !is_primary_key {
            abort!(field, "auto_increment is only supported on the primary key");
        }

        if is_auto_increment && !INTEGER_TYPES.contains(&ty_str.as_str()) {
            abort!(
                field.ty,
                "auto_increment requires an integer key, got '{}'",
                ty_str
            );
        }

        // Append column
        columns.push(ColumnInfo {
            ident,
            ty: field.ty.clone(),
            ty_str,
            length,
            is_primary_key,
            is_auto_increment,
            default,
            is_unique,
        });
    }

    columns
}

fn is_xrepo_attr(attr: &Attribute) -> bool {
    attr.path.is_ident("xrepo")
}

fn parse_xrepo_attr(attr: &Attribute) -> Vec<AttrInfo> {
    const PARSE_ERR_STR: &str = "Parse failed, syntax is #[xrepo(field [= value])]";
    const ARG_HELP: &str = r#"Syntax is xrepo(primary_key | auto_increment | unique | table_name = "NAME" | length = NUMBER | default = (NUMBER | STR) | index = [col1, col2, ...], ...)"#;

    let mut attrs = Vec::<AttrInfo>::new();

    // Generate function call tokens: xrepo(xxx)
    let path = attr.path.clone();
    let toks = attr.tokens.clone();
    let call_toks = quote::quote! {#path #toks};

    let args = if let Ok(call) = syn::parse2::<syn::ExprCall>(call_toks) {
        call.args
    } else {
        abort!(attr.tokens, PARSE_ERR_STR);
    };

    // Parse args
    for expr in &args {
        match expr {
            Expr::Path(p) => {
                let field_name = p.to_token_stream().to_string();
                match field_name.as_str() {
                    "primary_key" => attrs.push(AttrInfo::PrimaryKey),
                    "auto_increment" => attrs.push(AttrInfo::AutoIncrement),
                    "unique" => attrs.push(AttrInfo::Unique),
                    _ => abort!(expr, "Syntax error while decode path"; help = ARG_HELP),
                }
            }
            Expr::Assign(assign) => {
                let field_name = assign.left.to_token_stream().to_string();
                match field_name.as_str() {
                    // Parse table_name = "NAME"
                    "table_name" => attrs.push(AttrInfo::TableName(get_str(&assign.right))),

                    // Parse length = NUMBER
                    "length" => attrs.push(AttrInfo::Length(get_num(&assign.right))),

                    // Parse index = [col1, col2, ...]
                    "index" => attrs.push(AttrInfo::Index(get_path_arr(&assign.right))),

                    // Parse default = (NUMBER | STR)
                    "default" => attrs.push(AttrInfo::Default(get_sql_lit(&assign.right))),

                    _ => abort!(expr, "Syntax error while decode assign"; help = ARG_HELP),
                }
            }
            _ => abort!(expr, "Syntax error while match expr"; help = ARG_HELP),
        }
    }

    attrs
}

/// Get string from expr
fn get_str(expr: &Expr) -> String {
    if let Expr::Lit(lit) = expr {
        if let Lit::Str(s) = &lit.lit {
            return s.value();
        }
    }

    abort!(expr, "Expect string")
}

/// Get number from expr
fn get_num(expr: &Expr) -> usize {
    if let Expr::Lit(lit) = expr {
        if let Lit::Int(n) = &lit.lit {
            if let Ok(n) = n.base10_parse::<usize>() {
                return n;
            }
        }
    }

    abort!(expr, "Expect integer")
}

/// Get ident from expr
fn get_path(expr: &Expr) -> String {
    if let Expr::Path(path) = expr {
        if let Some(ident) = path.path.get_ident() {
            return ident.to_string();
        }
    }

    abort!(expr, "Expect column name")
}

/// Get path array from expr
fn get_path_arr(expr: &Expr) -> Vec<String> {
    if let Expr::Array(arr) = expr {
        return arr.elems.iter().map(get_path).collect();
    }

    abort!(expr, "Expect column name array")
}

/// Get sql lit from expr
/// for example: 1 => "1", 1.1 => "1.1", "str" => "'str'"
fn get_sql_lit(expr: &Expr) -> String {
    if let Expr::Lit(lit) = expr {
        match &lit.lit {
            Lit::Int(n) => return n.to_string(),
            Lit::Float(n) => return n.to_string(),
            Lit::Str(s) => return format!("'{}'", s.value().replace('\'', "''")),
            Lit::Bool(b) => return if b.value { "1".into() } else { "0".into() },
            _ => {}
        }
    }

    abort!(expr, "Expect literal")
}
