use proc_macro2::TokenStream;
use proc_macro_error::abort;
use quote::quote;

use crate::{ColumnInfo, TableInfo};

pub fn generate(info: TableInfo) -> TokenStream {
    let struct_name = &info.struct_name;
    let table_name_str = &info.table_name;
    let pk = &info.primary_key;
    let pk_ident = &pk.ident;
    let pk_ty = &pk.ty;
    let pk_name = pk.name();
    let info_toks = gen_table_info(&info);
    let from_row_toks = gen_from_row(&info);
    let to_pairs_toks = gen_to_pairs(&info);
    let pk_ty_str = &pk.ty_str;
    let set_primary_key_toks = if pk.is_auto_increment {
        quote! {
            self.#pk_ident = <#pk_ty as std::convert::TryFrom<u64>>::try_from(id).map_err(|_| {
                xrepo::error::Error::OutOfRange(format!(
                    "Generated id {} does not fit `{}`",
                    id, #pk_ty_str
                ))
            })?;
            Ok(())
        }
    } else {
        quote! {
            let _ = id;
            Ok(())
        }
    };

    quote! {
        impl xrepo::Entity for #struct_name {
            type PrimaryKey = #pk_ty;

            const TABLE_NAME: &'static str = #table_name_str;

            const PRIMARY_KEY: &'static str = #pk_name;

            const INFO: xrepo::TableInfo = #info_toks;

            #from_row_toks

            #to_pairs_toks

            fn primary_key(&self) -> Self::PrimaryKey {
                self.#pk_ident.clone()
            }

            fn set_primary_key(&mut self, id: u64) -> xrepo::error::Result<()> {
                #set_primary_key_toks
            }
        }
    }
}

fn gen_table_info(info: &TableInfo) -> TokenStream {
    let table_name_str = &info.table_name;
    let columns_toks = info
        .columns
        .iter()
        .map(|col| {
            let name = col.name();
            let (ty_toks, is_not_null) = gen_column_type_and_is_not_null(col);
            let is_primary_key = col.is_primary_key;
            let is_auto_increment = col.is_auto_increment;
            let default = if let Some(def) = &col.default {
                quote! { Some(#def) }
            } else {
                quote! { None }
            };
            let is_unique = col.is_unique;

            quote! {
                xrepo::ColumnInfo {
                    name: #name,
                    ty: #ty_toks,
                    is_primary_key: #is_primary_key,
                    is_not_null: #is_not_null,
                    is_auto_increment: #is_auto_increment,
                    default: #default,
                    is_unique: #is_unique,
                }
            }
        })
        .collect::<Vec<_>>();
    let index_toks = info
        .indexes
        .iter()
        .map(|index| {
            let index_name = format!("{}_index_{}", info.table_name, index.join("_"));
            let keys_toks = index
                .iter()
                .map(|column_name| {
                    quote! {
                        xrepo::IndexKeyInfo {
                            column_name: #column_name,
                        }
                    }
                })
                .collect::<Vec<_>>();

            quote! {
                xrepo::IndexInfo {
                    name: #index_name,
                    keys: &[#(#keys_toks),*],
                }
            }
        })
        .collect::<Vec<_>>();

    quote! {
        xrepo::TableInfo {
            name: #table_name_str,
            columns: &[#(#columns_toks),*],
            indexes: &[#(#index_toks),*],
        }
    }
}

fn gen_from_row(info: &TableInfo) -> TokenStream {
    let field_toks = info
        .columns
        .iter()
        .map(|col| {
            let ident = &col.ident;
            let name = col.name();

            quote! {
                #ident: row.get(#name)?,
            }
        })
        .collect::<Vec<_>>();

    quote! {
        fn from_row(row: xrepo::Row) -> xrepo::error::Result<Self> {
            Ok(Self {
                #(#field_toks)*
            })
        }
    }
}

fn gen_to_pairs(info: &TableInfo) -> TokenStream {
    let push_toks = info
        .columns
        .iter()
        .map(|col| {
            let ident = &col.ident;
            let ty = &col.ty;
            let name = col.name();

            if col.is_auto_increment {
                // Unset auto increment key is left to the database
                quote! {
                    if self.#ident != <#ty as Default>::default() {
                        pairs.push((#name, self.#ident.to_value()));
                    }
                }
            } else {
                quote! {
                    pairs.push((#name, self.#ident.to_value()));
                }
            }
        })
        .collect::<Vec<_>>();

    quote! {
        fn to_pairs(&self) -> Vec<(&'static str, xrepo::Value)> {
            use xrepo::ToValue;

            let mut pairs = Vec::new();

            #(#push_toks)*

            pairs
        }
    }
}

fn gen_column_type_and_is_not_null(col: &ColumnInfo) -> (TokenStream, bool) {
    let length = col.length.unwrap_or(65535);

    let (inner, is_not_null) = match col
        .ty_str
        .strip_prefix("Option<")
        .and_then(|s| s.strip_suffix('>'))
    {
        Some(inner) => (inner, false),
        None => (col.ty_str.as_str(), true),
    };

    let ty_toks = match inner {
        "bool" => quote! { xrepo::ColumnType::Bool },
        "i8" => quote! { xrepo::ColumnType::I8 },
        "u8" => quote! { xrepo::ColumnType::U8 },
        "i16" => quote! { xrepo::ColumnType::I16 },
        "u16" => quote! { xrepo::ColumnType::U16 },
        "i32" => quote! { xrepo::ColumnType::I32 },
        "u32" => quote! { xrepo::ColumnType::U32 },
        "i64" => quote! { xrepo::ColumnType::I64 },
        "u64" => quote! { xrepo::ColumnType::U64 },
        "f32" => quote! { xrepo::ColumnType::F32 },
        "f64" => quote! { xrepo::ColumnType::F64 },
        "String" => quote! { xrepo::ColumnType::Str(#length) },
        "Vec<u8>" => quote! { xrepo::ColumnType::Bytes(#length) },
        _ => abort!(
            col.ty,
            "Unsupported column type '{}', name: '{}'",
            col.ty_str,
            col.name()
        ),
    };

    (ty_toks, is_not_null)
}
