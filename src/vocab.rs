//! Statically authored vocabulary tables.
//!
//! The handful of RDF / RDFS / XSD terms the engine itself refers to,
//! listed as plain data so callers can look them up without any namespace
//! machinery.

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

pub const RDF: &[(&str, &str)] = &[
    ("type", "http://www.w3.org/1999/02/22-rdf-syntax-ns#type"),
    ("Property", "http://www.w3.org/1999/02/22-rdf-syntax-ns#Property"),
    ("langString", "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString"),
];

pub const RDFS: &[(&str, &str)] = &[
    ("label", "http://www.w3.org/2000/01/rdf-schema#label"),
    ("comment", "http://www.w3.org/2000/01/rdf-schema#comment"),
    ("Class", "http://www.w3.org/2000/01/rdf-schema#Class"),
    ("seeAlso", "http://www.w3.org/2000/01/rdf-schema#seeAlso"),
];

pub const XSD: &[(&str, &str)] = &[
    ("string", "http://www.w3.org/2001/XMLSchema#string"),
    ("boolean", "http://www.w3.org/2001/XMLSchema#boolean"),
    ("integer", "http://www.w3.org/2001/XMLSchema#integer"),
    ("int", "http://www.w3.org/2001/XMLSchema#int"),
    ("long", "http://www.w3.org/2001/XMLSchema#long"),
    ("decimal", "http://www.w3.org/2001/XMLSchema#decimal"),
    ("double", "http://www.w3.org/2001/XMLSchema#double"),
    ("date", "http://www.w3.org/2001/XMLSchema#date"),
    ("time", "http://www.w3.org/2001/XMLSchema#time"),
    ("dateTime", "http://www.w3.org/2001/XMLSchema#dateTime"),
    ("hexBinary", "http://www.w3.org/2001/XMLSchema#hexBinary"),
];

/// Looks a local name up in one of the tables above.
pub fn lookup(table: &'static [(&'static str, &'static str)], local: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(name, _)| *name == local)
        .map(|(_, iri)| *iri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_known_terms() {
        // The result borrows the static table, not the lookup key.
        let type_iri: Option<&'static str> = lookup(RDF, &String::from("type"));
        assert_eq!(type_iri, Some(RDF_TYPE));
        assert_eq!(lookup(RDF, "type"), Some(RDF_TYPE));
        assert_eq!(
            lookup(XSD, "integer"),
            Some("http://www.w3.org/2001/XMLSchema#integer")
        );
        assert_eq!(lookup(XSD, "nope"), None);
    }
}
