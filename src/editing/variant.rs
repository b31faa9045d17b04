use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Replicate,
    OpenAi,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Replicate => "Replicate",
            Self::OpenAi => "OpenAI",
        })
    }
}

/// provider, model and parameters of one generation flow
#[derive(Debug)]
pub struct VariantSpec {
    pub provider: ProviderKind,
    pub model: &'static str,
    pub label: &'static str,
    pub callback_data: &'static str,
    pub size: Option<&'static str>,
    pub quality: Option<&'static str>,
    pub requires_source: bool,
    pub requires_mask: bool,
}

const FLUX_KONTEXT: VariantSpec = VariantSpec {
    provider: ProviderKind::Replicate,
    model: "black-forest-labs/flux-kontext-pro",
    label: "Flux Kontext",
    callback_data: "variant:flux_kontext",
    size: None,
    quality: None,
    requires_source: true,
    requires_mask: false,
};

const DALL_E_EDIT: VariantSpec = VariantSpec {
    provider: ProviderKind::OpenAi,
    model: "dall-e-2",
    label: "DALL·E inpainting",
    callback_data: "variant:dall_e_edit",
    size: Some("1024x1024"),
    quality: None,
    requires_source: true,
    requires_mask: true,
};

const DALL_E_GENERATE: VariantSpec = VariantSpec {
    provider: ProviderKind::OpenAi,
    model: "dall-e-3",
    label: "DALL·E 3",
    callback_data: "variant:dall_e_generate",
    size: Some("1024x1024"),
    quality: Some("standard"),
    requires_source: false,
    requires_mask: false,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GenerationVariant {
    FluxKontext,
    DallEEdit,
    DallEGenerate,
}

impl GenerationVariant {
    pub const ALL: [Self; 3] = [Self::FluxKontext, Self::DallEEdit, Self::DallEGenerate];

    /// used for photos sent with a caption
    pub const SINGLE_STEP: Self = Self::FluxKontext;

    pub const fn spec(self) -> &'static VariantSpec {
        match self {
            Self::FluxKontext => &FLUX_KONTEXT,
            Self::DallEEdit => &DALL_E_EDIT,
            Self::DallEGenerate => &DALL_E_GENERATE,
        }
    }

    /// button payload naming the variant and the user who may press it
    pub fn callback_data(self, owner: u64) -> String {
        format!("{}:{owner}", self.spec().callback_data)
    }

    pub fn from_callback_data(data: &str) -> Option<(Self, u64)> {
        let (data, owner) = data.rsplit_once(':')?;
        let variant = Self::ALL.into_iter().find(|variant| variant.spec().callback_data == data)?;
        Some((variant, owner.parse().ok()?))
    }

    /// variants which transform a source photo
    pub fn edit_variants() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(|variant| variant.spec().requires_source)
    }
}

impl fmt::Display for GenerationVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().label)
    }
}
