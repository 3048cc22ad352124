//! Proptest generators for property-based testing.

use chrono::NaiveDate;
use proptest::prelude::*;

use eyp_core::{
    Attachment, BuildError, BuiltPackage, CoverDocument, DeliveryTarget, PackageBuilder,
    PackageMetadata, Party, SignerInfo,
};

/// Generate cover bytes of 1..=max_len bytes.
pub fn cover_bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=max_len.max(1))
}

/// Generate arbitrary content, possibly empty.
pub fn content(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a document number such as `E-12345678-010.01-42`.
pub fn document_number() -> impl Strategy<Value = String> {
    "E-[0-9]{8}-[0-9]{3}\\.[0-9]{2}-[0-9]{1,6}".prop_map(String::from)
}

/// Generate a non-blank display name, Turkish letters included.
pub fn name() -> impl Strategy<Value = String> {
    "[A-ZÇĞİÖŞÜ][a-zçğıöşü]{1,15}( [A-ZÇĞİÖŞÜ][a-zçğıöşü]{1,15}){0,3}".prop_map(String::from)
}

/// Generate a date between 2000 and 2099.
pub fn date() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("day 1-28 always exists"))
}

/// Generate a party with a name and optional id and role.
pub fn party() -> impl Strategy<Value = Party> {
    (name(), proptest::option::of("[0-9]{8}"), proptest::option::of(name())).prop_map(
        |(name, id, role)| Party {
            id,
            name: Some(name),
            role,
        },
    )
}

/// Generate a delivery target address.
pub fn delivery_target() -> impl Strategy<Value = DeliveryTarget> {
    ("[a-z]{3,12}@hs0[1-9]\\.kep\\.tr", proptest::option::of(name())).prop_map(
        |(target, purpose)| DeliveryTarget { target, purpose },
    )
}

/// Generate complete, valid metadata.
pub fn metadata() -> impl Strategy<Value = PackageMetadata> {
    (
        document_number(),
        date(),
        name(),
        party(),
        prop::collection::vec(party(), 0..4),
        prop::collection::vec(delivery_target(), 0..3),
    )
        .prop_map(|(number, date, subject, sender, recipients, targets)| {
            let mut metadata = PackageMetadata::new()
                .document_number(number)
                .date(date)
                .subject(subject)
                .sender(sender);
            metadata.recipients = recipients;
            metadata.delivery_targets = targets;
            metadata
        })
}

/// Generate a resolved attachment.
pub fn attachment() -> impl Strategy<Value = Attachment> {
    ("[a-z]{1,12}\\.(txt|pdf|xml)", content(256))
        .prop_map(|(file_name, bytes)| Attachment::new(file_name, "application/octet-stream", bytes))
}

/// Generate a signer.
pub fn signer() -> impl Strategy<Value = SignerInfo> {
    (name(), name(), proptest::option::of(name())).prop_map(|(first, last, title)| {
        let signer = SignerInfo::new(first, last);
        match title {
            Some(title) => signer.with_title(title),
            None => signer,
        }
    })
}

/// Parameters for building a package.
#[derive(Debug, Clone)]
pub struct PackageParams {
    pub cover: Vec<u8>,
    pub metadata: PackageMetadata,
    pub attachments: Vec<Attachment>,
    pub signers: Vec<SignerInfo>,
}

impl PackageParams {
    pub fn build(&self) -> Result<BuiltPackage, BuildError> {
        PackageBuilder::new(
            CoverDocument::new("cover.pdf", self.cover.clone()),
            self.metadata.clone(),
        )
        .attachments(self.attachments.clone())
        .signers(self.signers.clone())
        .build()
    }
}

impl Arbitrary for PackageParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            cover_bytes(4096),
            metadata(),
            prop::collection::vec(attachment(), 0..5),
            prop::collection::vec(signer(), 0..3),
        )
            .prop_map(|(cover, metadata, attachments, signers)| PackageParams {
                cover,
                metadata,
                attachments,
                signers,
            })
            .boxed()
    }
}
