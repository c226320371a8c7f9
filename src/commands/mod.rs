/*!
Command handlers for the CLI

- `history`: read, page through and maintain stored conversations
- `record`: run one turn with reply fragments read from stdin

Handlers build the store from configuration and print human-readable or
JSON output; all behavior lives in the library modules.
*/

pub mod history;
pub mod record;
