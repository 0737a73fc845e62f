//! Transports perform the network I/O of a single attempt.

use std::io::Write;

use crate::context::Context;
use crate::entity::Entity;
use crate::filter::FilterProcessor;
use crate::response::Response;

mod mock;
#[cfg(feature = "transport-ureq")]
mod ureq_transport;

pub use self::mock::{MockTransport, RequestMock};
#[cfg(feature = "transport-ureq")]
pub use self::ureq_transport::{UreqTransport, UreqTransportBuilder};

/// Executes one attempt of a call.
///
/// The attempt's request is [`Context::request`]. Implementations apply its method,
/// headers, query parameters, timeouts, redirect and certificate policy, pass the
/// body through [`FilterProcessor::filter_output_stream`] exactly once, and build the
/// [`Response`] with [`Context::converters`].
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        context: &mut Context,
        entity: Option<Entity>,
        filters: &FilterProcessor,
    ) -> crate::Result<Response>;
}

/// Copies the entity into `sink` through the output stream filters and closes it.
pub fn transmit_entity<'a>(
    context: &mut Context,
    filters: &FilterProcessor,
    mut entity: Entity,
    sink: Box<dyn Write + 'a>,
) -> crate::Result<()> {
    let mut output = filters.filter_output_stream(context, sink);
    std::io::copy(&mut entity.input_stream(), &mut output)?;
    output.flush()?;
    // wrappers such as gzip write their trailer when dropped
    drop(output);
    entity.close();
    Ok(())
}

/// Request body bytes as they leave the output stream filters.
pub fn encode_entity(
    context: &mut Context,
    filters: &FilterProcessor,
    entity: Entity,
) -> crate::Result<Vec<u8>> {
    let mut body = Vec::new();
    transmit_entity(context, filters, entity, Box::new(&mut body))?;
    Ok(body)
}
