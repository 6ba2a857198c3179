/// Declares a string-backed identifier type. Regions, queues and adapters
/// are all identified by operator-assigned strings; distinct newtypes keep
/// them from being mixed up at call sites.
#[macro_export]
macro_rules! string_key {
    ($TypeName: ident) => {
        #[derive(
            Clone,
            Debug,
            Default,
            Eq,
            Hash,
            Ord,
            PartialEq,
            PartialOrd,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $TypeName(String);

        impl PartialEq<str> for $TypeName {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl std::fmt::Display for $TypeName {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $TypeName {
            fn from(id: String) -> Self {
                $TypeName(id)
            }
        }

        impl From<&str> for $TypeName {
            fn from(id: &str) -> Self {
                $TypeName(id.to_owned())
            }
        }
    };
}
