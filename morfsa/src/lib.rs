/*! Minimal acyclic finite-state automata over byte strings.

Compiles a strictly sorted set of byte sequences (word forms, tags, word
lists) into a minimal deterministic acyclic automaton and serializes it into
one of two compact binary layouts:

- [`FSA5`](serialize::Fsa5Serializer): fixed goto-length arcs, fast to
  decode.
- [`CFSA2`](serialize::Cfsa2Serializer): label-indexed, v-int coded arcs
  with an optimized node layout, smaller but slower to write.

Both layouts can optionally store the right-language count of every state,
which turns the automaton into a perfect hash of its language
(see [`matching::perfect_hash`]).

# Usage examples

```
use morfsa::builder::FsaBuilder;
use morfsa::fsa::{self, Fsa};
use morfsa::serialize::{Cfsa2Serializer, FsaSerializer};

let automaton = FsaBuilder::build(["a", "ab", "abc", "b"]).unwrap();
let bytes = Cfsa2Serializer::new()
    .with_numbers()
    .serialize_to_vec(&automaton)
    .unwrap();

let reader = fsa::read(bytes).unwrap();
let words: Vec<Vec<u8>> = reader.sequences().collect();
assert_eq!(words, vec![b"a".to_vec(), b"ab".to_vec(), b"abc".to_vec(), b"b".to_vec()]);
```
*/

#![warn(missing_docs)]
pub mod builder;
pub mod compare;
pub mod dot;
pub mod fsa;
pub mod matching;
pub mod memory;
pub mod serialize;
pub mod traversal;
pub mod vint;

pub(crate) mod constants;
pub mod types;

pub use self::builder::{BuildError, FsaBuilder};
pub use self::fsa::{AnyFsa, Fsa, FsaError, FsaFlag, FsaFlags};
pub use self::serialize::{Cfsa2Serializer, Fsa5Serializer, FsaSerializer, SerializeError};
pub use self::types::{ArcIndex, NodeIndex};
