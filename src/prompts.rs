//! Prompts for invoice extraction.
//!
//! The requested fields and the table layout are defined only here.
//! Callers can override the default via [`crate::config::ExtractionConfig::prompt`].

/// Default instruction sent as the first text part of the user turn.
///
/// The page images follow it as `fileData` parts.
pub const DEFAULT_INVOICE_PROMPT: &str = r#"Create a table from the given image of the invoice as a JSON object.
The giving image is the invoice.
Return a created table as a JSON object.
No descriptions and explanations. Return only raw JSON object without markdown. No markdown format.
The required properties in JSON object are as follows.

[Properties in JSON object]
"invoiceTitle": "title of invoice"
"invoiceDate": "date of invoice"
"invoiceNumber": "number of the invoice"
"invoiceDestinationName": "Name of destination of invoice"
"invoiceDestinationAddress": "address of the destination of invoice"
"totalCost": "total cost of all costs"
"table": "Table of invoice. This is a 2-dimensional array. Add the first header row to the table in the 2-dimensional array."

[Format of 2-dimensional array of "table"]
"title or description of item", "number of items", "unit cost", "total cost"

If the requirement information is not found, set "no value".
Return only raw JSON object without markdown. No markdown format. No markdown tags."#;

/// Description of the structured-output tool and its `items` parameter.
pub const STRUCTURED_OUTPUT_DESCRIPTION: &str = "Output type is JSON object type. When the output type is object type, this is used. No descriptions and explanations.";

/// Keys the default prompt asks for, in prompt order.
pub const INVOICE_FIELDS: [&str; 7] = [
    "invoiceTitle",
    "invoiceDate",
    "invoiceNumber",
    "invoiceDestinationName",
    "invoiceDestinationAddress",
    "totalCost",
    "table",
];
