/// Errors of this crate.
///
/// Loading a forest is the only fallible step of the inference engine;
/// an estimation cycle itself never fails on image content.

use db_reader::biwi::BiwiReadError;

error_chain!{
    foreign_links {
        Io(::std::io::Error);
        Json(::serde_json::Error);
        Biwi(BiwiReadError);
    }

    errors {
        MalformedTree(reason: String) {
            description("malformed tree")
            display("malformed tree: {}", reason)
        }
        GeometryMismatch(expected: (u32, u32), found: (u32, u32)) {
            description("trees of the forest have different patch sizes")
            display("patch size {:?} differs from the forest patch size {:?}", found, expected)
        }
        EmptyForest {
            description("forest without trees")
            display("a forest needs at least one tree")
        }
        InvalidParameter(reason: String) {
            description("invalid estimation parameter")
            display("invalid estimation parameter: {}", reason)
        }
    }
}
